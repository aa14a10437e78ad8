//! Model snapshots.
//!
//! Hosted providers expose no weights, so "saving a model" records which
//! provider and model answered, in a small JSON descriptor. Loading the
//! descriptor later pins the same provider and model even when the
//! environment has changed.

use crate::error::CatalogError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Component the snapshot belongs to: `doc-vqa`, `moondream` or `keywords`.
    pub profile: String,
    pub provider: String,
    pub model: String,
    pub saved_at: DateTime<Utc>,
}

impl ModelSnapshot {
    pub fn new(profile: &str, provider: &str, model: &str) -> Self {
        Self {
            profile: profile.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            saved_at: Utc::now(),
        }
    }

    /// Write the descriptor as pretty JSON (temp file + rename).
    pub fn write(&self, dest: &Path) -> Result<(), CatalogError> {
        let dir = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| CatalogError::io(dir, e))?;
        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CatalogError::io(dir, e))?;
        serde_json::to_writer_pretty(tmp.as_file(), self).map_err(|e| snapshot_err(dest, e))?;
        tmp.persist(dest)
            .map_err(|e| CatalogError::io(dest, e.error))?;
        Ok(())
    }

    /// Read a descriptor and check it was saved by `expected_profile`.
    pub fn read(path: &Path, expected_profile: &str) -> Result<Self, CatalogError> {
        let bytes = std::fs::read(path).map_err(|e| CatalogError::io(path, e))?;
        let snap: Self = serde_json::from_slice(&bytes).map_err(|e| snapshot_err(path, e))?;
        if snap.profile != expected_profile {
            return Err(CatalogError::Snapshot {
                path: path.to_path_buf(),
                reason: format!(
                    "saved by '{}', cannot be loaded by '{}'",
                    snap.profile, expected_profile
                ),
            });
        }
        Ok(snap)
    }
}

fn snapshot_err(path: &Path, e: serde_json::Error) -> CatalogError {
    CatalogError::Snapshot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("models/moondream.json");
        let snap = ModelSnapshot::new("moondream", "ollama", "moondream");
        snap.write(&p).unwrap();
        assert_eq!(ModelSnapshot::read(&p, "moondream").unwrap(), snap);
    }

    #[test]
    fn overwrite_leaves_only_the_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("vqa.json");
        ModelSnapshot::new("doc-vqa", "openai", "gpt-4.1-nano")
            .write(&p)
            .unwrap();
        let newer = ModelSnapshot::new("doc-vqa", "anthropic", "claude-haiku");
        newer.write(&p).unwrap();

        assert_eq!(ModelSnapshot::read(&p, "doc-vqa").unwrap(), newer);
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn profile_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("kw.json");
        ModelSnapshot::new("keywords", "openai", "gpt-4.1-nano")
            .write(&p)
            .unwrap();
        let err = ModelSnapshot::read(&p, "doc-vqa").unwrap_err();
        assert!(err.to_string().contains("keywords"), "got: {err}");
    }
}
