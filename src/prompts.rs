//! Prompts sent to the vision and text-generation models.
//!
//! Every question lives here so prompt changes never touch retry or
//! cleanup logic, and tests can inspect them without a model.

/// System message for every front-page question.
pub const VISION_SYSTEM_PROMPT: &str = "You read the cover or first page of a document \
and answer questions about it. Answer with the requested text only, without \
explanations, quotes or Markdown.";

/// Questions asked by the document-VQA profile.
pub mod doc_vqa {
    pub const TITLE: &str = "What is the title of this document? Please doublecheck your answer.";
    pub const PUBLISHER: &str = "What is the publisher of this document? It is usually written in a corner. Please doublecheck your answer.";
}

/// Questions asked by the moondream profile.
pub mod moondream {
    pub const TITLE: &str = "What is the title?";
    pub const PUBLISHER: &str = "What is the name of the publisher? Just return the name.";
}

/// First keyword prompt: describe the sciences a book covers.
pub fn keyword_topics_prompt(title: &str) -> String {
    format!("Please give keywords what sciences this book is about: '{title}'")
}

/// Second keyword prompt: reduce the description to a comma-separated list.
pub fn keyword_extract_prompt(description: &str) -> String {
    format!(
        "Please extract the keywords mentioned in this book description and list these comma separated: {description}"
    )
}
