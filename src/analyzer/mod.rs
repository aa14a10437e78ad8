//! Document analyzers: infer catalog metadata from a PDF's front page.
//!
//! Every backend implements [`DocumentAnalyzer`]. The caller loads it once,
//! then for each file calls [`DocumentAnalyzer::analyze`] followed by the
//! getters. Getters before a successful `analyze` fail with
//! [`CatalogError::NotAnalyzed`].
//!
//! Backends are picked from [`AnalyzerKind`] by [`build_analyzer`]:
//!
//! | Kind        | Title / publisher source                   |
//! |-------------|--------------------------------------------|
//! | `pdf-meta`  | embedded info + Crossref record by ISBN    |
//! | `doc-vqa`   | VLM questions, document-VQA phrasing       |
//! | `moondream` | VLM questions, short captioning phrasing   |

pub mod pdfmeta;
pub mod vision;

pub use pdfmeta::PdfMetaAnalyzer;
pub use vision::{VisionAnalyzer, VisionProfile};

use crate::config::{AnalyzerKind, CatalogConfig};
use crate::crossref::CrossrefClient;
use crate::error::CatalogError;
use crate::pipeline::llm::{CallSettings, Pacer};
use crate::pipeline::render::{self, year_from_date, FrontPage};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Capability shared by all metadata-extraction backends.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Name of the extraction method: "PDF Metadata" or a model id.
    fn extraction_name(&self) -> String;

    /// Prepare the backend. `snapshot` restores a descriptor written by
    /// [`DocumentAnalyzer::save`].
    async fn load(&mut self, snapshot: Option<&Path>) -> Result<(), CatalogError>;

    /// Snapshot the loaded backend to `dest`.
    async fn save(&self, dest: &Path) -> Result<(), CatalogError>;

    /// Validate `path`, render its front page and cache the result.
    async fn analyze(&mut self, path: &Path) -> Result<(), CatalogError>;

    /// Front page of the last successful `analyze`.
    fn front_page(&self) -> Option<&FrontPage>;

    async fn title(&self) -> Result<String, CatalogError>;

    async fn publisher(&self) -> Result<String, CatalogError>;

    /// Year from the embedded creation date, `None` when absent.
    async fn publishing_year(&self) -> Result<Option<i32>, CatalogError> {
        let page = self.analyzed()?;
        Ok(page.info.creation_date.as_deref().and_then(year_from_date))
    }

    async fn page_count(&self) -> Result<u32, CatalogError> {
        Ok(self.analyzed()?.info.page_count)
    }

    fn analyzed(&self) -> Result<&FrontPage, CatalogError> {
        self.front_page().ok_or(CatalogError::NotAnalyzed)
    }
}

/// How front pages are rendered for analysis.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub scale: f32,
    pub pdfium_lib_path: Option<PathBuf>,
    pub debug_front_page: Option<PathBuf>,
}

impl RenderSettings {
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self {
            scale: config.render_scale,
            pdfium_lib_path: config.pdfium_lib_path.clone(),
            debug_front_page: config.debug_front_page.clone(),
        }
    }

    /// Validate and render `path`, dumping the page when debugging.
    pub async fn render(&self, path: &Path) -> Result<FrontPage, CatalogError> {
        validate_pdf_path(path)?;
        let page =
            render::render_front_page(path, self.scale, self.pdfium_lib_path.as_deref()).await?;
        if let Some(ref dest) = self.debug_front_page {
            render::save_debug_png(&page, dest)?;
        }
        Ok(page)
    }
}

/// A path is analyzable when it ends in `.pdf` (any case) and is a file.
pub fn validate_pdf_path(path: &Path) -> Result<(), CatalogError> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(CatalogError::NotAPdf {
            path: path.to_path_buf(),
        });
    }
    if !path.is_file() {
        return Err(CatalogError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Construct the analyzer selected by `config.analyzer`. The result still
/// needs [`DocumentAnalyzer::load`].
pub fn build_analyzer(
    config: &CatalogConfig,
    pacer: Arc<Pacer>,
) -> Result<Box<dyn DocumentAnalyzer>, CatalogError> {
    let render = RenderSettings::from_config(config);
    let analyzer: Box<dyn DocumentAnalyzer> = match config.analyzer {
        AnalyzerKind::PdfMeta => {
            let client =
                CrossrefClient::new(config.crossref_base_url.clone(), config.crossref_rows)?;
            Box::new(PdfMetaAnalyzer::new(
                config.publisher.clone().unwrap_or_default(),
                config.fetch_metadata,
                config.metadata_dir.clone(),
                client,
                config.crossref_max_results,
                render,
            ))
        }
        AnalyzerKind::DocVqa | AnalyzerKind::Moondream => {
            let profile = if config.analyzer == AnalyzerKind::DocVqa {
                VisionProfile::doc_vqa()
            } else {
                VisionProfile::moondream()
            };
            Box::new(VisionAnalyzer::new(
                profile,
                config.vision.clone(),
                CallSettings::for_answers(config),
                render,
                pacer,
            ))
        }
    };
    Ok(analyzer)
}
