//! End-to-end integration tests for smartlib.
//!
//! Tests that render PDFs need a pdfium shared library and are gated behind
//! the `E2E_ENABLED` environment variable. Point `PDFIUM_LIB_PATH` at the
//! library when it is not installed system-wide.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture

use smartlib::{
    build_analyzer, AnalyzerKind, CatalogConfig, CatalogStore, Cataloger, Form,
    KeywordModelKind, Pacer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test if E2E_ENABLED is not set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

/// A one-page PDF whose info dictionary carries `title`.
fn minimal_pdf(title: &str) -> Vec<u8> {
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] >>".to_string(),
        format!("<< /Title ({title}) /CreationDate (D:20190301000000Z) >>"),
    ];

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R /Info 4 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

fn library_with(files: &[(&str, Vec<u8>)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, bytes) in files {
        std::fs::write(dir.path().join(name), bytes).unwrap();
    }
    dir
}

fn offline_config(metadata_dir: &Path) -> CatalogConfig {
    let mut builder = CatalogConfig::builder()
        .analyzer(AnalyzerKind::PdfMeta)
        .keyword_model(KeywordModelKind::None)
        .publisher("Test Press")
        .metadata_dir(metadata_dir)
        .form(Form::Book)
        .pause(Duration::ZERO);
    if let Ok(lib) = std::env::var("PDFIUM_LIB_PATH") {
        builder = builder.pdfium_lib_path(PathBuf::from(lib));
    }
    builder.build().unwrap()
}

// ── Input validation (no pdfium needed) ──────────────────────────────────────

#[tokio::test]
async fn test_analyze_rejects_invalid_paths() {
    let dir = library_with(&[("notes.txt", b"plain text".to_vec())]);
    let config = offline_config(dir.path());
    let mut analyzer = build_analyzer(&config, Arc::new(Pacer::new(Duration::ZERO))).unwrap();
    analyzer.load(None).await.unwrap();

    for path in [dir.path().join("notes.txt"), dir.path().join("missing.pdf")] {
        let err = analyzer.analyze(&path).await.unwrap_err();
        assert!(err.is_invalid_input(), "{}: {err}", path.display());
    }
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_catalog_directory_with_embedded_title() {
    e2e_skip_unless_enabled!();

    let dir = library_with(&[
        ("intro.pdf", minimal_pdf("Intro to X")),
        ("readme.txt", b"not a pdf".to_vec()),
    ]);
    let config = offline_config(dir.path());
    let mut cataloger = Cataloger::from_config(&config).await.unwrap();
    let mut store = CatalogStore::open_in_memory().await.unwrap();

    let report = cataloger
        .catalog_directory(dir.path(), &mut store)
        .await
        .unwrap();
    assert_eq!(report.stats.written, 1, "failures: {:?}", report.failures);
    assert_eq!(report.stats.skipped, 1);

    let entry = &report.entries[0];
    assert_eq!(entry.title, "Intro to X");
    assert_eq!(entry.year, Some(2019));
    assert_eq!(entry.page_count, Some(1));
    assert_eq!(entry.publisher.as_deref(), Some("Test Press"));

    let hits = store.query_books("*", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Intro to X");
    assert_eq!(hits[0].author, "Published By Test Press");
    assert!(store.has_file(&dir.path().join("intro.pdf")).await.unwrap());
    assert_eq!(store.book_count(), 1);
}

#[tokio::test]
async fn test_preview_plan_round_trip() {
    e2e_skip_unless_enabled!();

    let dir = library_with(&[("a.pdf", minimal_pdf("Planned Book"))]);
    let config = offline_config(dir.path());
    let mut cataloger = Cataloger::from_config(&config).await.unwrap();

    let (plan, report) = cataloger.plan_directory(dir.path()).await.unwrap();
    assert_eq!(report.stats.written, 0);
    let plan_path = dir.path().join("plan.json");
    plan.write(&plan_path).unwrap();

    let mut store = CatalogStore::open_in_memory().await.unwrap();
    let plan = smartlib::CatalogPlan::read(&plan_path).unwrap();
    let applied = smartlib::apply_plan(&mut store, &plan, true, None)
        .await
        .unwrap();
    assert_eq!(applied.stats.written, 1);
    let hits = store.query_books("*", None).await.unwrap();
    assert_eq!(hits[0].title, "Planned Book");
}

#[tokio::test]
async fn test_corrupt_pdf_is_a_file_error() {
    e2e_skip_unless_enabled!();

    let dir = library_with(&[("broken.pdf", b"%PDF-1.4\nthis is not a pdf".to_vec())]);
    let config = offline_config(dir.path());
    let mut cataloger = Cataloger::from_config(&config).await.unwrap();
    let mut store = CatalogStore::open_in_memory().await.unwrap();

    let report = cataloger
        .catalog_directory(dir.path(), &mut store)
        .await
        .unwrap();
    assert_eq!(report.stats.failed, 1);
    assert_eq!(store.book_count(), 0);
}
