//! Front-page stages shared by every analyzer.
//!
//! ## Data Flow
//!
//! ```text
//! path ──▶ render ──▶ encode ──▶ llm ──▶ postprocess
//!         (pdfium)   (base64)   (VLM)   (cleanup)
//! ```
//!
//! 1. [`render`] — rasterise page 0 and read the info dictionary; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`encode`] — PNG-encode and base64-wrap the page for multimodal requests
//! 3. [`llm`]    — resolve a provider and ask with retry/backoff; the only
//!    stage with network I/O
//! 4. [`postprocess`] — reduce a raw answer to the bare catalog value
//!
//! The `pdf-meta` analyzer stops after `render`.

pub mod encode;
pub mod llm;
pub mod postprocess;
pub mod render;
