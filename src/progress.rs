//! Progress-callback trait for per-file cataloging events.
//!
//! Inject an [`Arc<dyn CatalogProgressCallback>`] via
//! [`crate::config::CatalogConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks a directory. Files are processed one at a
//! time, so events arrive in order.
//!
//! # Example
//!
//! ```rust
//! use smartlib::{CatalogConfig, CatalogProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl CatalogProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, title: &str) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {}", index, total, title);
//!     }
//! }
//!
//! let config = CatalogConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the cataloging pipeline as it processes each file.
///
/// All methods have no-op defaults so callers only override what they care
/// about. Indices are 1-based.
pub trait CatalogProgressCallback: Send + Sync {
    /// Called once with the number of directory entries about to be visited.
    fn on_catalog_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before the analyzer sees a PDF.
    fn on_file_start(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called when a file produced an entry (and, in direct mode, was committed).
    fn on_file_complete(&self, index: usize, total: usize, title: &str) {
        let _ = (index, total, title);
    }

    /// Called for non-PDF entries that were skipped.
    fn on_file_skipped(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called when analysis or the catalog write failed for a file.
    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every entry has been visited.
    fn on_catalog_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl CatalogProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CatalogConfig`].
pub type ProgressCallback = Arc<dyn CatalogProgressCallback>;
