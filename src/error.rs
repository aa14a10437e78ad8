//! Error types for the smartlib library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CatalogError`] — **Fatal** for the call that raised it: bad input
//!   path, oversized title, unregistered topic, unbound pdfium, database
//!   failure. Returned as `Err(CatalogError)` from analyzer, store and
//!   pipeline entry points.
//!
//! * [`FileError`] — **Non-fatal**: a single file of a cataloging pass could
//!   not be analyzed or written, but every other file is fine. Collected in
//!   [`crate::model::CatalogReport`] so one unreadable PDF does not lose the
//!   whole directory.
//!
//! Transient extraction failures (page count, publishing year) never reach
//! either type; they degrade to `0` / `None` where they happen.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the smartlib library.
#[derive(Debug, Error)]
pub enum CatalogError {
    // ── Invalid input ─────────────────────────────────────────────────────
    /// The path does not carry a `.pdf` extension.
    #[error("Can only analyze PDFs: '{path}'")]
    NotAPdf { path: PathBuf },

    /// The path does not point to an existing file.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Book titles are capped at 100 characters.
    #[error("Title is {len} characters long (max 100): '{title}'")]
    TitleTooLong { title: String, len: usize },

    /// Book titles must not be empty.
    #[error("A book needs a non-empty title")]
    MissingTitle,

    /// Topic is not registered and auto-registration was disabled.
    #[error("'{topic}' is an unknown topic")]
    UnknownTopic { topic: String },

    /// The subtopic edge would close a cycle in the topic hierarchy.
    #[error("'{sub}' cannot be a subtopic of '{base}': the hierarchy would become cyclic")]
    TopicCycle { base: String, sub: String },

    /// Publisher names must not be blank.
    #[error("A publisher needs a non-empty name")]
    EmptyPublisher,

    /// Form name outside the closed form enumeration.
    #[error("Unknown form '{form}'\nExpected one of: book, lecture document, exercise, website, collection, notes, research article, dataset, code")]
    UnknownForm { form: String },

    // ── Analyzer state ────────────────────────────────────────────────────
    /// A getter was called before a successful `analyze`.
    #[error("No document analyzed yet; call analyze(path) first")]
    NotAnalyzed,

    /// A model-backed component was used before `load`.
    #[error("Model '{name}' is not loaded; call load() first")]
    ModelNotLoaded { name: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not open the document.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium returned an error while rendering the front page.
    #[error("Rasterisation failed for '{path}': {detail}")]
    RasterisationFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, or point PDFIUM_LIB_PATH at the\n\
directory (or file) that contains it.\n"
    )]
    PdfiumBindingFailed(String),

    /// The front page could not be encoded for the VLM request.
    #[error("Failed to encode front page: {0}")]
    EncodeFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API failed after every retry.
    #[error("LLM API error after {retries} retries: {message}")]
    LlmApiError { retries: u32, message: String },

    // ── Bibliographic metadata ────────────────────────────────────────────
    /// Crossref request or decoding failed.
    #[error("Failed to fetch Crossref metadata for publisher '{publisher}': {reason}")]
    MetadataFetch { publisher: String, reason: String },

    /// Reading or writing a `*_crossref_mdb.dump` cache file failed.
    #[error("Metadata cache '{path}' is unusable: {reason}")]
    MetadataCache { path: PathBuf, reason: String },

    // ── Model snapshots ───────────────────────────────────────────────────
    /// A snapshot descriptor could not be read or written.
    #[error("Model snapshot '{path}' is unusable: {reason}")]
    Snapshot { path: PathBuf, reason: String },

    // ── Store errors ──────────────────────────────────────────────────────
    /// The database rejected a statement. The open transaction must be
    /// cancelled by the caller.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Appending to the statement log failed.
    #[error("Failed to append to statement log '{path}': {source}")]
    StatementLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog has no registered owner.
    #[error("Catalog has no registered owner.\nRun `smartlib init <database> <user>` first.")]
    NoOwner,

    // ── Query service ─────────────────────────────────────────────────────
    /// The HTTP listener could not be bound or failed while serving.
    #[error("Query service on {addr} failed: {source}")]
    Serve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── Plans ─────────────────────────────────────────────────────────────
    /// A preview plan could not be read or written.
    #[error("Catalog plan '{path}' is unusable: {reason}")]
    Plan { path: PathBuf, reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// True for errors caused by the caller's input rather than by the
    /// environment: bad path or extension, oversized or empty title,
    /// unregistered topic, unknown form.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            CatalogError::NotAPdf { .. }
                | CatalogError::FileNotFound { .. }
                | CatalogError::TitleTooLong { .. }
                | CatalogError::MissingTitle
                | CatalogError::UnknownTopic { .. }
                | CatalogError::TopicCycle { .. }
                | CatalogError::EmptyPublisher
                | CatalogError::UnknownForm { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal error for a single file of a cataloging pass.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// The analyzer could not produce metadata for the file.
    #[error("{path}: analysis failed: {detail}")]
    AnalysisFailed { path: PathBuf, detail: String },

    /// The catalog rejected the entry; its transaction was cancelled.
    #[error("{path}: catalog write failed: {detail}")]
    WriteFailed { path: PathBuf, detail: String },
}

impl FileError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            FileError::AnalysisFailed { path, .. } | FileError::WriteFailed { path, .. } => path,
        }
    }
}
