//! Configuration types for cataloging runs and the catalog store.
//!
//! Cataloging behaviour is controlled through [`CatalogConfig`], built via
//! [`CatalogConfigBuilder`]. The store has its own small [`StoreConfig`]
//! because the query service opens a store without ever cataloging.
//!
//! Setters clamp out-of-range values; [`CatalogConfigBuilder::build`] rejects
//! combinations that cannot work (a `pdf-meta` run that fetches metadata but
//! names no publisher, for instance).

use crate::error::CatalogError;
use crate::model::Form;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default Crossref endpoint.
pub const CROSSREF_BASE_URL: &str = "https://api.crossref.org";

/// Upper bound on the number of Crossref records fetched per publisher.
pub const CROSSREF_MAX_RESULTS: usize = 240_000;

/// Which metadata-extraction backend analyses the front page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalyzerKind {
    /// Embedded PDF metadata plus a Crossref record keyed on the ISBN.
    #[default]
    PdfMeta,
    /// Document visual question answering.
    DocVqa,
    /// Small captioning VLM, served through Ollama by default.
    Moondream,
}

impl AnalyzerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalyzerKind::PdfMeta => "pdf-meta",
            AnalyzerKind::DocVqa => "doc-vqa",
            AnalyzerKind::Moondream => "moondream",
        }
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyzerKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf-meta" | "pdfmeta" | "meta" => Ok(AnalyzerKind::PdfMeta),
            "doc-vqa" | "docvqa" | "donut" => Ok(AnalyzerKind::DocVqa),
            "moondream" => Ok(AnalyzerKind::Moondream),
            other => Err(CatalogError::InvalidConfig(format!(
                "unknown analyzer '{other}' (expected pdf-meta, doc-vqa or moondream)"
            ))),
        }
    }
}

/// Which keyword-inference backend runs after the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeywordModelKind {
    /// Two-step prompting of a text-generation model.
    #[default]
    TextGeneration,
    /// Always returns an empty answer.
    None,
}

/// How to reach a model: a pre-built provider, a named provider, or the
/// environment.
///
/// Resolution order is documented on [`crate::pipeline::llm::resolve_provider`].
#[derive(Clone, Default)]
pub struct ModelSelection {
    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,
    /// Provider name, e.g. "openai", "anthropic", "ollama".
    pub provider_name: Option<String>,
    /// Model identifier. `None` uses the profile default.
    pub model: Option<String>,
}

impl fmt::Debug for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSelection")
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .finish()
    }
}

/// Configuration for a cataloging pass.
///
/// Built via [`CatalogConfig::builder()`] or using [`CatalogConfig::default()`].
///
/// # Example
/// ```rust
/// use smartlib::{AnalyzerKind, CatalogConfig, Form};
///
/// let config = CatalogConfig::builder()
///     .analyzer(AnalyzerKind::PdfMeta)
///     .publisher("Springer")
///     .form(Form::Book)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct CatalogConfig {
    /// Metadata-extraction backend. Default: [`AnalyzerKind::PdfMeta`].
    pub analyzer: AnalyzerKind,

    /// Keyword backend. Default: [`KeywordModelKind::TextGeneration`].
    pub keyword_model: KeywordModelKind,

    /// Form assigned to every book of the pass. Default: [`Form::Book`].
    pub form: Form,

    /// Register unknown topics on the fly instead of rejecting the book.
    /// Default: true.
    pub auto_register_topics: bool,

    /// Publisher of the catalogued files. `pdf-meta` reports it verbatim and
    /// uses it to select the Crossref cache.
    pub publisher: Option<String>,

    /// Fetch Crossref records when no cache file exists. Default: false.
    pub fetch_metadata: bool,

    /// Directory holding `<publisher>_crossref_mdb.dump` caches. Default: ".".
    pub metadata_dir: PathBuf,

    /// Crossref endpoint. Default: [`CROSSREF_BASE_URL`].
    pub crossref_base_url: String,

    /// Cap on fetched Crossref records. Default: [`CROSSREF_MAX_RESULTS`].
    pub crossref_max_results: usize,

    /// Page size of a Crossref cursor request. Default: 1000.
    pub crossref_rows: usize,

    /// Vision model used by `doc-vqa` and `moondream`.
    pub vision: ModelSelection,

    /// Text model used for keyword inference.
    pub keywords: ModelSelection,

    /// Sampling temperature for every model call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens for a VLM answer. Default: 256.
    pub max_answer_tokens: usize,

    /// Maximum tokens for a keyword answer. Default: 2048.
    pub max_keyword_tokens: usize,

    /// Maximum retry attempts on a failed model call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Pause between successive model calls. Default: 1 s.
    pub pause: Duration,

    /// Zoom factor for the front-page render. Range: 0.5–8.0. Default: 2.0.
    pub render_scale: f32,

    /// Directory or file of the pdfium shared library. `None` binds the
    /// system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Write every rendered front page to this PNG path (last one wins).
    pub debug_front_page: Option<PathBuf>,

    /// Analyzer snapshot to restore on load.
    pub analyzer_snapshot: Option<PathBuf>,

    /// Keyword-model snapshot to restore on load.
    pub keyword_snapshot: Option<PathBuf>,

    /// Per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerKind::default(),
            keyword_model: KeywordModelKind::default(),
            form: Form::default(),
            auto_register_topics: true,
            publisher: None,
            fetch_metadata: false,
            metadata_dir: PathBuf::from("."),
            crossref_base_url: CROSSREF_BASE_URL.to_string(),
            crossref_max_results: CROSSREF_MAX_RESULTS,
            crossref_rows: 1000,
            vision: ModelSelection::default(),
            keywords: ModelSelection::default(),
            temperature: 0.1,
            max_answer_tokens: 256,
            max_keyword_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 500,
            pause: Duration::from_millis(1000),
            render_scale: 2.0,
            pdfium_lib_path: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
            debug_front_page: None,
            analyzer_snapshot: None,
            keyword_snapshot: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("analyzer", &self.analyzer)
            .field("keyword_model", &self.keyword_model)
            .field("form", &self.form)
            .field("auto_register_topics", &self.auto_register_topics)
            .field("publisher", &self.publisher)
            .field("fetch_metadata", &self.fetch_metadata)
            .field("metadata_dir", &self.metadata_dir)
            .field("vision", &self.vision)
            .field("keywords", &self.keywords)
            .field("max_retries", &self.max_retries)
            .field("pause", &self.pause)
            .field("render_scale", &self.render_scale)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .finish()
    }
}

impl CatalogConfig {
    /// Create a new builder for `CatalogConfig`.
    pub fn builder() -> CatalogConfigBuilder {
        CatalogConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CatalogConfig`].
#[derive(Debug)]
pub struct CatalogConfigBuilder {
    config: CatalogConfig,
}

impl CatalogConfigBuilder {
    pub fn analyzer(mut self, kind: AnalyzerKind) -> Self {
        self.config.analyzer = kind;
        self
    }

    pub fn keyword_model(mut self, kind: KeywordModelKind) -> Self {
        self.config.keyword_model = kind;
        self
    }

    pub fn form(mut self, form: Form) -> Self {
        self.config.form = form;
        self
    }

    pub fn auto_register_topics(mut self, v: bool) -> Self {
        self.config.auto_register_topics = v;
        self
    }

    pub fn publisher(mut self, name: impl Into<String>) -> Self {
        self.config.publisher = Some(name.into());
        self
    }

    pub fn fetch_metadata(mut self, v: bool) -> Self {
        self.config.fetch_metadata = v;
        self
    }

    pub fn metadata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.metadata_dir = dir.into();
        self
    }

    pub fn crossref_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.crossref_base_url = url.into();
        self
    }

    pub fn crossref_max_results(mut self, n: usize) -> Self {
        self.config.crossref_max_results = n;
        self
    }

    pub fn crossref_rows(mut self, n: usize) -> Self {
        self.config.crossref_rows = n.clamp(1, 1000);
        self
    }

    pub fn vision_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.vision.provider_name = Some(name.into());
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision.model = Some(model.into());
        self
    }

    pub fn vision_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.vision.provider = Some(provider);
        self
    }

    pub fn keyword_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.keywords.provider_name = Some(name.into());
        self
    }

    pub fn keyword_model_name(mut self, model: impl Into<String>) -> Self {
        self.config.keywords.model = Some(model.into());
        self
    }

    pub fn keyword_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.keywords.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_answer_tokens(mut self, n: usize) -> Self {
        self.config.max_answer_tokens = n.max(1);
        self
    }

    pub fn max_keyword_tokens(mut self, n: usize) -> Self {
        self.config.max_keyword_tokens = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn pause(mut self, pause: Duration) -> Self {
        self.config.pause = pause;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.5, 8.0);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn debug_front_page(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.debug_front_page = Some(path.into());
        self
    }

    pub fn analyzer_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.analyzer_snapshot = Some(path.into());
        self
    }

    pub fn keyword_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.keyword_snapshot = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CatalogConfig, CatalogError> {
        let c = &self.config;
        if c.analyzer == AnalyzerKind::PdfMeta
            && c.fetch_metadata
            && c.publisher.as_deref().is_none_or(|p| p.trim().is_empty())
        {
            return Err(CatalogError::InvalidConfig(
                "fetching Crossref metadata needs a publisher name".into(),
            ));
        }
        if c.crossref_base_url.trim().is_empty() {
            return Err(CatalogError::InvalidConfig(
                "Crossref base URL must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Where the catalog lives on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. Created on first open.
    pub database: PathBuf,
    /// Statement log. `None` means `locallog.txt` next to the database.
    pub log_path: Option<PathBuf>,
    /// Skip the statement log entirely.
    pub disable_log: bool,
}

impl StoreConfig {
    /// Default statement-log file name.
    pub const DEFAULT_LOG_NAME: &'static str = "locallog.txt";

    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            log_path: None,
            disable_log: false,
        }
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn without_log(mut self) -> Self {
        self.disable_log = true;
        self
    }

    /// Resolved statement-log path, or `None` when logging is disabled.
    pub fn log_file(&self) -> Option<PathBuf> {
        if self.disable_log {
            return None;
        }
        Some(self.log_path.clone().unwrap_or_else(|| {
            self.database
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(Self::DEFAULT_LOG_NAME)
        }))
    }
}
