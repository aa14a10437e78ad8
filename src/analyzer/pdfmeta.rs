//! Rule-based analyzer: embedded PDF info plus a Crossref record.
//!
//! The file name is expected to carry the ISBN (`978-3-030-12345-6.pdf`).
//! Each field takes the most authoritative source available:
//!
//! | Field     | Lowest → highest precedence                          |
//! |-----------|------------------------------------------------------|
//! | title     | file stem → Crossref title → embedded `/Title`       |
//! | year      | creation date → `created` → `issued` → `published`   |
//! | publisher | the configured publisher                             |

use super::{DocumentAnalyzer, RenderSettings};
use crate::crossref::{self, BibRecord, CrossrefClient};
use crate::error::CatalogError;
use crate::pipeline::render::{year_from_date, FrontPage};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const EXTRACTION_NAME: &str = "PDF Metadata";

struct Analysis {
    page: FrontPage,
    record: Option<BibRecord>,
}

pub struct PdfMetaAnalyzer {
    publisher: String,
    fetch: bool,
    metadata_dir: PathBuf,
    client: CrossrefClient,
    max_results: usize,
    render: RenderSettings,
    records: Vec<BibRecord>,
    current: Option<Analysis>,
}

impl PdfMetaAnalyzer {
    pub fn new(
        publisher: String,
        fetch: bool,
        metadata_dir: PathBuf,
        client: CrossrefClient,
        max_results: usize,
        render: RenderSettings,
    ) -> Self {
        Self {
            publisher,
            fetch,
            metadata_dir,
            client,
            max_results,
            render,
            records: Vec::new(),
            current: None,
        }
    }

    /// Records currently available for ISBN lookup.
    pub fn records(&self) -> &[BibRecord] {
        &self.records
    }

    fn cache_path(&self) -> PathBuf {
        crossref::cache_path(&self.metadata_dir, &self.publisher)
    }

    fn record(&self) -> Result<Option<&BibRecord>, CatalogError> {
        let a = self.current.as_ref().ok_or(CatalogError::NotAnalyzed)?;
        Ok(a.record.as_ref())
    }
}

#[async_trait]
impl DocumentAnalyzer for PdfMetaAnalyzer {
    fn extraction_name(&self) -> String {
        EXTRACTION_NAME.to_string()
    }

    /// Load the bibliography: an existing cache wins; otherwise fetch (and
    /// cache) when fetching is enabled; otherwise start empty.
    async fn load(&mut self, _snapshot: Option<&Path>) -> Result<(), CatalogError> {
        if self.publisher.trim().is_empty() {
            self.records.clear();
            return Ok(());
        }

        let cache = self.cache_path();
        if cache.is_file() {
            info!("Loading Crossref cache {}", cache.display());
            self.records = crossref::load_cache(&cache)?;
        } else if self.fetch {
            self.records = self
                .client
                .fetch_books(&self.publisher, self.max_results)
                .await?;
            crossref::save_cache(&cache, &self.records)?;
        } else {
            self.records.clear();
        }
        debug!("{} bibliography records available", self.records.len());
        Ok(())
    }

    async fn save(&self, _dest: &Path) -> Result<(), CatalogError> {
        Ok(())
    }

    async fn analyze(&mut self, path: &Path) -> Result<(), CatalogError> {
        let page = self.render.render(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let record = crossref::find_by_file_name(&self.records, &file_name).cloned();
        if record.is_some() {
            debug!("Crossref record found for {}", file_name);
        }
        self.current = Some(Analysis { page, record });
        Ok(())
    }

    fn front_page(&self) -> Option<&FrontPage> {
        self.current.as_ref().map(|a| &a.page)
    }

    async fn title(&self) -> Result<String, CatalogError> {
        let page = self.analyzed()?;
        if let Some(embedded) = page.info.title.as_deref() {
            return Ok(embedded.to_string());
        }
        if let Some(t) = self.record()?.and_then(BibRecord::first_title) {
            return Ok(t.to_string());
        }
        Ok(page
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default())
    }

    async fn publisher(&self) -> Result<String, CatalogError> {
        self.analyzed()?;
        Ok(self.publisher.clone())
    }

    async fn publishing_year(&self) -> Result<Option<i32>, CatalogError> {
        let page = self.analyzed()?;
        let from_record = self.record()?.and_then(BibRecord::year);
        Ok(from_record.or_else(|| page.info.creation_date.as_deref().and_then(year_from_date)))
    }
}
