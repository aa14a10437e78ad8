//! Keyword inference: a title in, free-form topic text out.
//!
//! The answer carries no structural guarantee; [`cleanup`] turns it into
//! topic names. A keyword model that fails to load is replaced by
//! [`NoopKeywords`] so cataloging still runs, just without topics.

pub mod cleanup;
pub mod textgen;

pub use textgen::TextGenerationKeywords;

use crate::config::{CatalogConfig, KeywordModelKind};
use crate::error::CatalogError;
use crate::pipeline::llm::{CallSettings, Pacer};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

#[async_trait]
pub trait KeywordInference: Send + Sync {
    /// Name of the extraction method, usually the model id.
    fn extraction_name(&self) -> String;

    async fn load(&mut self, snapshot: Option<&Path>) -> Result<(), CatalogError>;

    async fn save(&self, dest: &Path) -> Result<(), CatalogError>;

    /// Free-form keyword text for a book title.
    async fn keywords(&self, title: &str) -> Result<String, CatalogError>;
}

/// Stand-in that knows no keywords.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKeywords;

#[async_trait]
impl KeywordInference for NoopKeywords {
    fn extraction_name(&self) -> String {
        "none".to_string()
    }

    async fn load(&mut self, _snapshot: Option<&Path>) -> Result<(), CatalogError> {
        Ok(())
    }

    async fn save(&self, _dest: &Path) -> Result<(), CatalogError> {
        Ok(())
    }

    async fn keywords(&self, _title: &str) -> Result<String, CatalogError> {
        Ok(String::new())
    }
}

/// Construct and load the keyword backend selected by `config.keyword_model`.
///
/// Load failures degrade to [`NoopKeywords`] with a warning.
pub async fn build_keyword_inference(
    config: &CatalogConfig,
    pacer: Arc<Pacer>,
) -> Box<dyn KeywordInference> {
    match config.keyword_model {
        KeywordModelKind::None => Box::new(NoopKeywords),
        KeywordModelKind::TextGeneration => {
            let mut model = TextGenerationKeywords::new(
                config.keywords.clone(),
                CallSettings::for_keywords(config),
                pacer,
            );
            match model.load(config.keyword_snapshot.as_deref()).await {
                Ok(()) => Box::new(model),
                Err(e) => {
                    warn!("Keyword model unavailable, continuing without keywords: {}", e);
                    Box::new(NoopKeywords)
                }
            }
        }
    }
}
