//! # smartlib
//!
//! Catalog directories of PDF documents into a SQLite database and serve the
//! catalog to a web UI.
//!
//! Metadata (title, publisher, year) comes from one of three interchangeable
//! analyzers: embedded PDF info backed by a Crossref record, or a Vision
//! Language Model reading the rendered front page. A text model then infers
//! topics from the title.
//!
//! ## Pipeline Overview
//!
//! ```text
//! directory of PDFs
//!  │
//!  ├─ 1. Render    rasterise page 0 via pdfium (spawn_blocking)
//!  ├─ 2. Analyze   title / publisher / year / page count
//!  ├─ 3. Keywords  two-step text-model prompt → free text
//!  ├─ 4. Cleanup   split + title-case + strip noise → topic names
//!  └─ 5. Write     one transaction per file, or a reviewable plan
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smartlib::{AnalyzerKind, CatalogConfig, CatalogStore, Cataloger, StoreConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CatalogConfig::builder()
//!         .analyzer(AnalyzerKind::PdfMeta)
//!         .publisher("Springer")
//!         .build()?;
//!     let mut store = CatalogStore::open(&StoreConfig::new("library.db")).await?;
//!     let mut cataloger = Cataloger::from_config(&config).await?;
//!     let report = cataloger
//!         .catalog_directory(Path::new("books/"), &mut store)
//!         .await?;
//!     eprintln!("{} written, {} failed", report.stats.written, report.stats.failed);
//!     store.finish(true).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `smartlib` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! smartlib = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyzer;
pub mod catalog;
pub mod config;
pub mod crossref;
pub mod error;
pub mod keywords;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod server;
pub mod snapshot;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyzer::{build_analyzer, DocumentAnalyzer, PdfMetaAnalyzer, VisionAnalyzer, VisionProfile};
pub use catalog::{apply_plan, write_entry, CatalogPlan, Cataloger};
pub use config::{
    AnalyzerKind, CatalogConfig, CatalogConfigBuilder, KeywordModelKind, ModelSelection,
    StoreConfig,
};
pub use crossref::{BibRecord, CrossrefClient};
pub use error::{CatalogError, FileError};
pub use keywords::cleanup::{clean_keywords, split_keywords};
pub use keywords::{build_keyword_inference, KeywordInference, NoopKeywords, TextGenerationKeywords};
pub use model::{BookHit, CatalogEntry, CatalogReport, CatalogStats, Form};
pub use pipeline::llm::Pacer;
pub use progress::{CatalogProgressCallback, NoopProgressCallback, ProgressCallback};
pub use server::{create_router, serve, AppState};
pub use snapshot::ModelSnapshot;
pub use store::{CatalogStore, NewBook};
