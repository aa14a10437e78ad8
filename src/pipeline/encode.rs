//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! Multimodal providers accept images as base64 payloads embedded in the
//! JSON request. PNG keeps cover lettering crisp; `detail: "high"` asks
//! tiling providers for the full tile budget so small publisher marks in a
//! corner stay legible.

use crate::error::CatalogError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered front page as a base64 PNG ready for a VLM request.
pub fn encode_front_page(img: &DynamicImage) -> Result<ImageData, CatalogError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| CatalogError::EncodeFailed(e.to_string()))?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded front page → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
