//! Domain types shared by the store, the pipeline and the query service.

use crate::error::{CatalogError, FileError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Closed category of a catalogued document.
///
/// The discriminants are the `form_id` values seeded into the `form` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Form {
    #[default]
    Book = 1,
    #[serde(rename = "lecture document")]
    LectureDocument = 2,
    Exercise = 3,
    Website = 4,
    Collection = 5,
    Notes = 6,
    #[serde(rename = "research article")]
    ResearchArticle = 7,
    #[serde(alias = "data")]
    Dataset = 8,
    Code = 9,
}

impl Form {
    pub const ALL: [Form; 9] = [
        Form::Book,
        Form::LectureDocument,
        Form::Exercise,
        Form::Website,
        Form::Collection,
        Form::Notes,
        Form::ResearchArticle,
        Form::Dataset,
        Form::Code,
    ];

    pub fn id(self) -> i64 {
        self as i64
    }

    /// Name stored in `form.form_name`.
    pub fn name(self) -> &'static str {
        match self {
            Form::Book => "book",
            Form::LectureDocument => "lecture document",
            Form::Exercise => "exercise",
            Form::Website => "website",
            Form::Collection => "collection",
            Form::Notes => "notes",
            Form::ResearchArticle => "research article",
            Form::Dataset => "dataset",
            Form::Code => "code",
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Form {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        // The web UI sends "data" for datasets.
        if lowered == "data" {
            return Ok(Form::Dataset);
        }
        Form::ALL
            .into_iter()
            .find(|f| f.name() == lowered)
            .ok_or_else(|| CatalogError::UnknownForm {
                form: s.to_string(),
            })
    }
}

/// Metadata gathered for one file by a cataloging pass.
///
/// This is also the unit of a preview plan, so it round-trips through JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub keywords: Vec<String>,
    pub file: PathBuf,
    pub page_count: Option<u32>,
}

/// Aggregate statistics for a cataloging pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStats {
    /// Directory entries considered.
    pub files_seen: usize,
    /// Files that produced a [`CatalogEntry`].
    pub analyzed: usize,
    /// Entries committed to the store (0 in preview mode).
    pub written: usize,
    /// Files that failed analysis or writing.
    pub failed: usize,
    /// Non-PDF entries skipped without analysis.
    pub skipped: usize,
    pub total_duration_ms: u64,
}

/// Result of [`crate::catalog::Cataloger::catalog_directory`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogReport {
    pub entries: Vec<CatalogEntry>,
    pub failures: Vec<FileError>,
    pub stats: CatalogStats,
}

/// One record of the `/query` listing.
///
/// The "no match" sentinel is the only record without an `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookHit {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<i64>,
    pub title: String,
    pub author: String,
    pub keywords: Vec<String>,
    pub favourite: bool,
}

impl BookHit {
    pub const NO_MATCH_TITLE: &'static str = "Could not find any matches.";

    /// The record returned when a query matches nothing.
    pub fn no_match() -> Self {
        Self {
            id: None,
            title: Self::NO_MATCH_TITLE.to_string(),
            author: String::new(),
            keywords: Vec::new(),
            favourite: false,
        }
    }

    pub fn is_no_match(&self) -> bool {
        self.id.is_none() && self.title == Self::NO_MATCH_TITLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_ids_are_stable() {
        assert_eq!(Form::Book.id(), 1);
        assert_eq!(Form::ResearchArticle.id(), 7);
        assert_eq!(Form::Code.id(), 9);
    }

    #[test]
    fn form_parses_names_and_alias() {
        assert_eq!("Book".parse::<Form>().unwrap(), Form::Book);
        assert_eq!("research article".parse::<Form>().unwrap(), Form::ResearchArticle);
        assert_eq!("data".parse::<Form>().unwrap(), Form::Dataset);
        assert_eq!("dataset".parse::<Form>().unwrap(), Form::Dataset);
        let err = "magazine".parse::<Form>().unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn no_match_serialises_without_id() {
        let json = serde_json::to_value(BookHit::no_match()).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["title"], "Could not find any matches.");
        assert_eq!(json["favourite"], false);
    }
}
