//! Crossref bibliography: fetch, cache and ISBN lookup.
//!
//! The `pdf-meta` analyzer needs publication records for one publisher. They
//! come from the Crossref `works` endpoint, filtered to books, and are cached
//! as JSON in `<publisher>_crossref_mdb.dump` so a library is only fetched
//! once.
//!
//! Records are kept when they carry no `link` at all or when one of their
//! links is a PDF. A publisher that yields fewer than two records is almost
//! always a misspelt name, so the result is discarded with a warning.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// `date-parts` block of a Crossref date (`[[2019, 4, 12]]`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateParts {
    #[serde(rename = "date-parts", default)]
    pub date_parts: Vec<Vec<Option<i32>>>,
}

impl DateParts {
    pub fn year(&self) -> Option<i32> {
        self.date_parts.first().and_then(|p| p.first().copied().flatten())
    }
}

/// One entry of a record's `link` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BibLink {
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "content-type", default)]
    pub content_type: String,
}

/// Crossref serves `ISBN` as a list, older dumps as a single string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Isbns {
    One(String),
    Many(Vec<String>),
}

impl Isbns {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            Isbns::One(s) => std::slice::from_ref(s),
            Isbns::Many(v) => v,
        };
        slice.iter().map(String::as_str)
    }
}

/// The subset of a Crossref work the catalog uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BibRecord {
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(rename = "ISBN", default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<Isbns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(rename = "DOI", default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateParts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued: Option<DateParts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateParts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Vec<BibLink>>,
}

impl BibRecord {
    /// First title, if any.
    pub fn first_title(&self) -> Option<&str> {
        self.title.first().map(String::as_str).filter(|t| !t.trim().is_empty())
    }

    /// Most authoritative year: `published`, then `issued`, then `created`.
    pub fn year(&self) -> Option<i32> {
        [&self.published, &self.issued, &self.created]
            .into_iter()
            .find_map(|d| d.as_ref().and_then(DateParts::year))
    }

    /// Records without links are kept; linked records need a PDF link.
    pub fn has_pdf_or_no_links(&self) -> bool {
        match &self.link {
            None => true,
            Some(links) => links.iter().any(|l| l.content_type == "application/pdf"),
        }
    }

    fn matches_isbn(&self, isbn: &str) -> bool {
        self.isbn
            .as_ref()
            .is_some_and(|list| list.iter().any(|i| i.replace('-', "") == isbn))
    }
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    message: WorksMessage,
}

#[derive(Debug, Deserialize)]
struct WorksMessage {
    #[serde(default)]
    items: Vec<BibRecord>,
    #[serde(rename = "next-cursor", default)]
    next_cursor: Option<String>,
}

/// Async client for the Crossref `works` endpoint.
#[derive(Debug, Clone)]
pub struct CrossrefClient {
    http: reqwest::Client,
    base_url: String,
    rows: usize,
}

impl CrossrefClient {
    pub fn new(base_url: impl Into<String>, rows: usize) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("smartlib/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CatalogError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rows: rows.max(1),
        })
    }

    /// Fetch up to `max_results` book records for `publisher`, following
    /// Crossref's deep-paging cursor.
    pub async fn fetch_books(
        &self,
        publisher: &str,
        max_results: usize,
    ) -> Result<Vec<BibRecord>, CatalogError> {
        let start = Instant::now();
        info!("Fetching Crossref records for publisher '{}'", publisher);

        let url = format!("{}/works", self.base_url);
        let mut cursor = "*".to_string();
        let mut seen = 0usize;
        let mut kept = Vec::new();

        while seen < max_results {
            let rows = self.rows.min(max_results - seen).to_string();
            let response = self
                .http
                .get(&url)
                .query(&[
                    ("filter", "type:book"),
                    ("query.publisher-name", publisher),
                    ("rows", rows.as_str()),
                    ("cursor", cursor.as_str()),
                ])
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| fetch_error(publisher, e))?;

            let page: WorksResponse = response
                .json()
                .await
                .map_err(|e| fetch_error(publisher, e))?;

            let n = page.message.items.len();
            debug!("Crossref page: {} records (cursor {})", n, cursor);
            if n == 0 {
                break;
            }

            for record in page.message.items.into_iter().take(max_results - seen) {
                seen += 1;
                if record.has_pdf_or_no_links() {
                    kept.push(record);
                }
            }

            match page.message.next_cursor {
                Some(next) if next != cursor => cursor = next,
                _ => break,
            }
        }

        info!(
            "Fetched {} Crossref records for '{}' in {:?}",
            kept.len(),
            publisher,
            start.elapsed()
        );

        if kept.len() < 2 {
            warn!(
                "Crossref returned almost nothing for publisher '{}'. Is the name spelt the \
                 way Crossref lists it?",
                publisher
            );
            return Ok(Vec::new());
        }
        Ok(kept)
    }
}

fn fetch_error(publisher: &str, e: reqwest::Error) -> CatalogError {
    CatalogError::MetadataFetch {
        publisher: publisher.to_string(),
        reason: e.to_string(),
    }
}

/// Cache file for `publisher` inside `dir`: spaces become underscores.
pub fn cache_path(dir: &Path, publisher: &str) -> PathBuf {
    dir.join(format!("{}_crossref_mdb.dump", publisher.replace(' ', "_")))
}

pub fn load_cache(path: &Path) -> Result<Vec<BibRecord>, CatalogError> {
    let bytes = std::fs::read(path).map_err(|e| CatalogError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| CatalogError::MetadataCache {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write the cache atomically: a temp file in the same directory, then rename.
pub fn save_cache(path: &Path, records: &[BibRecord]) -> Result<(), CatalogError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let cache_err = |reason: String| CatalogError::MetadataCache {
        path: path.to_path_buf(),
        reason,
    };

    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CatalogError::io(dir, e))?;
    serde_json::to_writer(tmp.as_file(), records).map_err(|e| cache_err(e.to_string()))?;
    tmp.persist(path).map_err(|e| cache_err(e.error.to_string()))?;
    debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// ISBN encoded in a file name: the text before the first `.`, without `-`.
pub fn isbn_from_file_name(file_name: &str) -> String {
    file_name
        .split('.')
        .next()
        .unwrap_or_default()
        .replace('-', "")
}

/// Find the record whose ISBN list contains the ISBN of `file_name`.
pub fn find_by_file_name<'a>(records: &'a [BibRecord], file_name: &str) -> Option<&'a BibRecord> {
    let isbn = isbn_from_file_name(file_name);
    if isbn.is_empty() {
        return None;
    }
    records.iter().find(|r| r.matches_isbn(&isbn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(title: &str, isbn: &str) -> serde_json::Value {
        json!({
            "title": [title],
            "ISBN": [isbn],
            "publisher": "Springer",
            "published": {"date-parts": [[2019, 4]]},
            "link": [{"URL": "https://x/y.pdf", "content-type": "application/pdf"}]
        })
    }

    #[test]
    fn isbn_from_file_name_strips_hyphens_and_extension() {
        assert_eq!(isbn_from_file_name("978-3-030-12345-6.pdf"), "9783030123456");
        assert_eq!(isbn_from_file_name("978-3-030-12345-6.v2.pdf"), "9783030123456");
        assert_eq!(isbn_from_file_name("notes"), "notes");
    }

    #[test]
    fn lookup_accepts_string_and_list_isbns() {
        let records: Vec<BibRecord> = serde_json::from_value(json!([
            {"title": ["Single"], "ISBN": "9781111111111"},
            {"title": ["Listed"], "ISBN": ["978-3-030-12345-6", "978-3-030-12346-3"]},
            {"title": ["No ISBN"]}
        ]))
        .unwrap();

        let hit = find_by_file_name(&records, "978-3-030-12346-3.pdf").unwrap();
        assert_eq!(hit.first_title(), Some("Listed"));
        let hit = find_by_file_name(&records, "9781111111111.pdf").unwrap();
        assert_eq!(hit.first_title(), Some("Single"));
        assert!(find_by_file_name(&records, "9780000000000.pdf").is_none());
        assert!(find_by_file_name(&records, ".pdf").is_none());
    }

    #[test]
    fn year_precedence() {
        let r: BibRecord = serde_json::from_value(json!({
            "created": {"date-parts": [[2001]]},
            "issued": {"date-parts": [[2002, 1]]},
        }))
        .unwrap();
        assert_eq!(r.year(), Some(2002));

        let r: BibRecord = serde_json::from_value(json!({
            "created": {"date-parts": [[2001]]},
            "issued": {"date-parts": [[null]]},
        }))
        .unwrap();
        assert_eq!(r.year(), Some(2001));
    }

    #[test]
    fn link_filter() {
        let none: BibRecord = serde_json::from_value(json!({"title": ["a"]})).unwrap();
        assert!(none.has_pdf_or_no_links());
        let html: BibRecord = serde_json::from_value(json!({
            "link": [{"URL": "u", "content-type": "text/html"}]
        }))
        .unwrap();
        assert!(!html.has_pdf_or_no_links());
    }

    #[test]
    fn cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let p = cache_path(dir.path(), "Packt Publishing");
        assert!(p.ends_with("Packt_Publishing_crossref_mdb.dump"));

        let records: Vec<BibRecord> =
            serde_json::from_value(json!([record("A", "1"), record("B", "2")])).unwrap();
        save_cache(&p, &records).unwrap();
        assert_eq!(load_cache(&p).unwrap(), records);
    }

    #[test]
    fn corrupt_cache_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("x_crossref_mdb.dump");
        std::fs::write(&p, b"not json").unwrap();
        assert!(matches!(
            load_cache(&p).unwrap_err(),
            CatalogError::MetadataCache { .. }
        ));
    }

    #[tokio::test]
    async fn fetch_follows_cursor_and_filters_links() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("cursor", "*"))
            .and(query_param("filter", "type:book"))
            .and(query_param("query.publisher-name", "Springer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "message": {
                    "next-cursor": "page2",
                    "items": [
                        record("A", "1"),
                        {"title": ["HTML only"], "link": [{"URL": "u", "content-type": "text/html"}]},
                    ]
                }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "message": {
                    "next-cursor": "page3",
                    "items": [record("B", "2"), {"title": ["No links"]}]
                }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("cursor", "page3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "message": {"next-cursor": "page4", "items": []}
            })))
            .mount(&server)
            .await;

        let client = CrossrefClient::new(server.uri(), 2).unwrap();
        let records = client.fetch_books("Springer", 100).await.unwrap();
        let titles: Vec<_> = records.iter().filter_map(|r| r.first_title()).collect();
        assert_eq!(titles, vec!["A", "B", "No links"]);
    }

    #[tokio::test]
    async fn fetch_honours_result_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "message": {
                    "next-cursor": "same-forever",
                    "items": [record("A", "1"), record("B", "2"), record("C", "3")]
                }
            })))
            .mount(&server)
            .await;

        let client = CrossrefClient::new(server.uri(), 3).unwrap();
        let records = client.fetch_books("Springer", 2).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn fewer_than_two_results_yield_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "message": {"items": [record("Lonely", "1")]}
            })))
            .mount(&server)
            .await;

        let client = CrossrefClient::new(server.uri(), 10).unwrap();
        assert!(client.fetch_books("Sprnger", 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn http_errors_are_metadata_fetch_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = CrossrefClient::new(server.uri(), 10).unwrap();
        let err = client.fetch_books("Springer", 100).await.unwrap_err();
        assert!(matches!(err, CatalogError::MetadataFetch { .. }));
    }
}
