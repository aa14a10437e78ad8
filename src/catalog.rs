//! The cataloging pipeline.
//!
//! [`Cataloger`] walks a directory in name order. Each PDF goes through the
//! analyzer, then its title goes through keyword inference, and the keyword
//! text is split and cleaned into topics. The resulting [`CatalogEntry`] is
//! either written straight to a [`CatalogStore`] (one transaction per file,
//! committed or cancelled) or collected into a [`CatalogPlan`] for review
//! and a later [`apply_plan`].
//!
//! Files are processed strictly one after another. A file that fails
//! analysis or writing becomes a [`FileError`] in the report; the pass goes
//! on with the next one.

use crate::analyzer::{build_analyzer, DocumentAnalyzer};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, FileError};
use crate::keywords::cleanup::{clean_keywords, split_keywords};
use crate::keywords::{build_keyword_inference, KeywordInference};
use crate::model::{CatalogEntry, CatalogReport, Form};
use crate::pipeline::llm::Pacer;
use crate::progress::ProgressCallback;
use crate::store::{CatalogStore, NewBook};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A reviewable list of catalog insertions produced by a preview pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPlan {
    pub generated_at: DateTime<Utc>,
    pub source_dir: PathBuf,
    pub form: Form,
    /// Extraction method that produced the entries.
    #[serde(default)]
    pub extraction: String,
    pub entries: Vec<CatalogEntry>,
}

impl CatalogPlan {
    pub fn new(source_dir: impl Into<PathBuf>, form: Form, extraction: impl Into<String>) -> Self {
        Self {
            generated_at: Utc::now(),
            source_dir: source_dir.into(),
            form,
            extraction: extraction.into(),
            entries: Vec::new(),
        }
    }

    /// Write the plan as pretty JSON (temp file + rename).
    pub fn write(&self, dest: &Path) -> Result<(), CatalogError> {
        let dir = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| CatalogError::io(dir, e))?;
        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CatalogError::io(dir, e))?;
        serde_json::to_writer_pretty(tmp.as_file(), self).map_err(|e| plan_err(dest, e))?;
        tmp.persist(dest)
            .map_err(|e| CatalogError::io(dest, e.error))?;
        info!("Wrote plan with {} entries to {}", self.entries.len(), dest.display());
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, CatalogError> {
        let bytes = std::fs::read(path).map_err(|e| CatalogError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| plan_err(path, e))
    }
}

fn plan_err(path: &Path, e: serde_json::Error) -> CatalogError {
    CatalogError::Plan {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Drives an analyzer and a keyword backend over directories of PDFs.
pub struct Cataloger {
    analyzer: Box<dyn DocumentAnalyzer>,
    keywords: Box<dyn KeywordInference>,
    form: Form,
    auto_register: bool,
    progress: Option<ProgressCallback>,
}

impl Cataloger {
    /// Wrap already loaded backends.
    pub fn new(
        analyzer: Box<dyn DocumentAnalyzer>,
        keywords: Box<dyn KeywordInference>,
        form: Form,
    ) -> Self {
        Self {
            analyzer,
            keywords,
            form,
            auto_register: true,
            progress: None,
        }
    }

    /// Build and load both backends from `config`.
    ///
    /// Analyzer load failures are fatal; keyword load failures degrade to no
    /// keywords. Both backends share one pacer.
    pub async fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let pacer = Arc::new(Pacer::new(config.pause));
        let mut analyzer = build_analyzer(config, Arc::clone(&pacer))?;
        analyzer.load(config.analyzer_snapshot.as_deref()).await?;
        let keywords = build_keyword_inference(config, pacer).await;
        info!(
            "Cataloger ready: analyzer '{}', keywords '{}'",
            analyzer.extraction_name(),
            keywords.extraction_name()
        );
        Ok(Self {
            analyzer,
            keywords,
            form: config.form,
            auto_register: config.auto_register_topics,
            progress: config.progress_callback.clone(),
        })
    }

    pub fn with_auto_register(mut self, auto_register: bool) -> Self {
        self.auto_register = auto_register;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn analyzer(&self) -> &dyn DocumentAnalyzer {
        self.analyzer.as_ref()
    }

    pub fn keywords(&self) -> &dyn KeywordInference {
        self.keywords.as_ref()
    }

    /// Analyze one PDF and infer its topics.
    pub async fn analyze_file(&mut self, path: &Path) -> Result<CatalogEntry, CatalogError> {
        self.analyzer.analyze(path).await?;

        let title = self.analyzer.title().await?.trim().to_string();
        if title.is_empty() {
            return Err(CatalogError::MissingTitle);
        }
        let publisher = self.analyzer.publisher().await?.trim().to_string();
        let year = self.analyzer.publishing_year().await.unwrap_or_else(|e| {
            debug!("No publishing year for {}: {}", path.display(), e);
            None
        });
        let page_count = self.analyzer.page_count().await.unwrap_or_else(|e| {
            debug!("No page count for {}: {}", path.display(), e);
            0
        });

        let raw = self.keywords.keywords(&title).await.unwrap_or_else(|e| {
            warn!("Keyword inference failed for '{}': {}", title, e);
            String::new()
        });
        let keywords = clean_keywords(&split_keywords(&raw));

        Ok(CatalogEntry {
            title,
            publisher: (!publisher.is_empty()).then_some(publisher),
            year,
            keywords,
            file: path.to_path_buf(),
            page_count: (page_count > 0).then_some(page_count),
        })
    }

    /// Catalog every PDF of `dir` straight into `store`.
    pub async fn catalog_directory(
        &mut self,
        dir: &Path,
        store: &mut CatalogStore,
    ) -> Result<CatalogReport, CatalogError> {
        self.run(dir, Some(store)).await
    }

    /// Analyze every PDF of `dir` without touching a store.
    pub async fn plan_directory(
        &mut self,
        dir: &Path,
    ) -> Result<(CatalogPlan, CatalogReport), CatalogError> {
        let report = self.run(dir, None).await?;
        let mut plan = CatalogPlan::new(dir, self.form, self.analyzer.extraction_name());
        plan.entries = report.entries.clone();
        Ok((plan, report))
    }

    async fn run(
        &mut self,
        dir: &Path,
        mut store: Option<&mut CatalogStore>,
    ) -> Result<CatalogReport, CatalogError> {
        let start = Instant::now();
        let files = list_files(dir)?;
        let total = files.len();
        info!("Cataloging {} ({} files)", dir.display(), total);
        if let Some(ref cb) = self.progress {
            cb.on_catalog_start(total);
        }

        let mut report = CatalogReport::default();
        report.stats.files_seen = total;

        for (index, path) in files.iter().enumerate() {
            if !is_pdf(path) {
                debug!("Skipping non-PDF {}", path.display());
                report.stats.skipped += 1;
                if let Some(ref cb) = self.progress {
                    cb.on_file_skipped(index, total, path);
                }
                continue;
            }
            if let Some(store) = store.as_deref_mut() {
                if store.has_file(path).await? {
                    info!("Already catalogued: {}", path.display());
                    report.stats.skipped += 1;
                    if let Some(ref cb) = self.progress {
                        cb.on_file_skipped(index, total, path);
                    }
                    continue;
                }
            }

            if let Some(ref cb) = self.progress {
                cb.on_file_start(index, total, path);
            }

            let entry = match self.analyze_file(path).await {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Analysis failed for {}: {}", path.display(), e);
                    if let Some(ref cb) = self.progress {
                        cb.on_file_error(index, total, &e.to_string());
                    }
                    report.failures.push(FileError::AnalysisFailed {
                        path: path.clone(),
                        detail: e.to_string(),
                    });
                    continue;
                }
            };
            report.stats.analyzed += 1;

            if let Some(store) = store.as_deref_mut() {
                if let Err(e) = store_entry(store, &entry, self.form, self.auto_register).await {
                    if let Some(ref cb) = self.progress {
                        cb.on_file_error(index, total, &e.to_string());
                    }
                    report.failures.push(e);
                    continue;
                }
                report.stats.written += 1;
            }

            if let Some(ref cb) = self.progress {
                cb.on_file_complete(index, total, &entry.title);
            }
            report.entries.push(entry);
        }

        report.stats.failed = report.failures.len();
        report.stats.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Cataloged {}: {} analyzed, {} written, {} failed, {} skipped in {}ms",
            dir.display(),
            report.stats.analyzed,
            report.stats.written,
            report.stats.failed,
            report.stats.skipped,
            report.stats.total_duration_ms
        );
        if let Some(ref cb) = self.progress {
            cb.on_catalog_complete(total, report.entries.len());
        }
        Ok(report)
    }
}

/// Insert the publisher, book, topics and file of one entry. Leaves the
/// transaction open.
pub async fn write_entry(
    store: &mut CatalogStore,
    entry: &CatalogEntry,
    form: Form,
    auto_register: bool,
) -> Result<i64, CatalogError> {
    let publisher_id = match entry.publisher.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Some(store.add_publisher(name).await?),
        _ => None,
    };
    let book_id = store
        .add_book(
            &NewBook {
                title: entry.title.clone(),
                year: entry.year,
                publisher_id,
                form,
                topics: entry.keywords.clone(),
                favorite: false,
            },
            auto_register,
        )
        .await?;
    store
        .add_file(book_id, &entry.file, entry.page_count, "")
        .await?;
    Ok(book_id)
}

/// Write one entry in its own transaction: commit on success, cancel on
/// any failure.
async fn store_entry(
    store: &mut CatalogStore,
    entry: &CatalogEntry,
    form: Form,
    auto_register: bool,
) -> Result<i64, FileError> {
    let written = match write_entry(store, entry, form, auto_register).await {
        Ok(id) => store.commit_transaction().await.map(|_| id),
        Err(e) => Err(e),
    };
    match written {
        Ok(id) => Ok(id),
        Err(e) => {
            warn!("Catalog write failed for {}: {}", entry.file.display(), e);
            if let Err(cancel) = store.cancel_transaction().await {
                warn!("Rollback failed: {}", cancel);
            }
            Err(FileError::WriteFailed {
                path: entry.file.clone(),
                detail: e.to_string(),
            })
        }
    }
}

/// Execute a reviewed plan against `store`, one transaction per entry.
pub async fn apply_plan(
    store: &mut CatalogStore,
    plan: &CatalogPlan,
    auto_register: bool,
    progress: Option<&ProgressCallback>,
) -> Result<CatalogReport, CatalogError> {
    let start = Instant::now();
    let total = plan.entries.len();
    info!(
        "Applying plan for {} ({} entries)",
        plan.source_dir.display(),
        total
    );
    if let Some(cb) = progress {
        cb.on_catalog_start(total);
    }

    let mut report = CatalogReport::default();
    report.stats.files_seen = total;
    report.stats.analyzed = total;

    for (index, entry) in plan.entries.iter().enumerate() {
        if let Some(cb) = progress {
            cb.on_file_start(index, total, &entry.file);
        }
        if store.has_file(&entry.file).await? {
            report.stats.skipped += 1;
            if let Some(cb) = progress {
                cb.on_file_skipped(index, total, &entry.file);
            }
            continue;
        }
        match store_entry(store, entry, plan.form, auto_register).await {
            Ok(_) => {
                report.stats.written += 1;
                if let Some(cb) = progress {
                    cb.on_file_complete(index, total, &entry.title);
                }
                report.entries.push(entry.clone());
            }
            Err(e) => {
                if let Some(cb) = progress {
                    cb.on_file_error(index, total, &e.to_string());
                }
                report.failures.push(e);
            }
        }
    }

    report.stats.failed = report.failures.len();
    report.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    if let Some(cb) = progress {
        cb.on_catalog_complete(total, report.stats.written);
    }
    Ok(report)
}

/// Regular files of `dir`, sorted by name.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| CatalogError::io(dir, e))? {
        let path = entry.map_err(|e| CatalogError::io(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
