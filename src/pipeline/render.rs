//! Front-page rasterisation via pdfium.
//!
//! pdfium keeps thread-local state and blocks while rendering, so every call
//! runs inside `tokio::task::spawn_blocking`. The document is opened once per
//! analysis: page 0 is rendered and the embedded info dictionary is read in
//! the same pass.

use crate::error::CatalogError;
use image::DynamicImage;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Embedded document information read alongside the render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfInfo {
    pub title: Option<String>,
    pub creation_date: Option<String>,
    pub page_count: u32,
}

/// A rendered first page plus the document info.
#[derive(Debug, Clone)]
pub struct FrontPage {
    pub path: PathBuf,
    pub image: DynamicImage,
    pub info: PdfInfo,
}

/// Bind to pdfium: an explicit directory or file when given, else the
/// system library.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, CatalogError> {
    let bindings = match lib_path {
        Some(p) if p.is_file() => Pdfium::bind_to_library(p),
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| CatalogError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Render page 0 of `pdf_path` at `scale` and read its info dictionary.
pub async fn render_front_page(
    pdf_path: &Path,
    scale: f32,
    lib_path: Option<&Path>,
) -> Result<FrontPage, CatalogError> {
    let path = pdf_path.to_path_buf();
    let lib = lib_path.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || render_front_page_blocking(&path, scale, lib.as_deref()))
        .await
        .map_err(|e| CatalogError::Internal(format!("Render task panicked: {e}")))?
}

fn render_front_page_blocking(
    pdf_path: &Path,
    scale: f32,
    lib_path: Option<&Path>,
) -> Result<FrontPage, CatalogError> {
    let pdfium = bind_pdfium(lib_path)?;

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| CatalogError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{e:?}"),
            })?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };
    let title = get_meta(PdfDocumentMetadataTagType::Title);
    let creation_date = get_meta(PdfDocumentMetadataTagType::CreationDate);

    let pages = document.pages();
    let page_count = pages.len() as u32;
    info!("PDF loaded: {} ({} pages)", pdf_path.display(), page_count);

    let page = pages
        .get(0)
        .map_err(|e| CatalogError::RasterisationFailed {
            path: pdf_path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap =
        page.render_with_config(&render_config)
            .map_err(|e| CatalogError::RasterisationFailed {
                path: pdf_path.to_path_buf(),
                detail: format!("{e:?}"),
            })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered front page of {} → {}x{} px",
        pdf_path.display(),
        image.width(),
        image.height()
    );

    Ok(FrontPage {
        path: pdf_path.to_path_buf(),
        image,
        info: PdfInfo {
            title,
            creation_date,
            page_count,
        },
    })
}

/// Dump a rendered page for inspection.
pub fn save_debug_png(page: &FrontPage, dest: &Path) -> Result<(), CatalogError> {
    page.image
        .save_with_format(dest, image::ImageFormat::Png)
        .map_err(|e| CatalogError::EncodeFailed(format!("{}: {e}", dest.display())))?;
    debug!("Front page written to {}", dest.display());
    Ok(())
}

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[1-2][0-9]{3}").unwrap());

/// First plausible four-digit year in a PDF date string
/// (`"D:20190412093000Z"` → 2019).
pub fn year_from_date(date: &str) -> Option<i32> {
    RE_YEAR.find(date).and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_from_pdf_date() {
        assert_eq!(year_from_date("D:20190412093000Z"), Some(2019));
        assert_eq!(year_from_date("Tue Mar 03 1998"), Some(1998));
        assert_eq!(year_from_date("D:0099"), None);
        assert_eq!(year_from_date(""), None);
    }

    #[test]
    fn binding_a_missing_library_fails() {
        match bind_pdfium(Some(Path::new("/definitely/not/here"))) {
            Err(CatalogError::PdfiumBindingFailed(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("bound a library that does not exist"),
        }
    }
}
