//! Catalog schema and the standard topic seed.
//!
//! Every `CREATE` is `IF NOT EXISTS` so the same script bootstraps a new
//! database, re-creates tables after [`DROP_TABLES`], and can be replayed
//! from the statement log.

use crate::model::Form;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS publisher (
    pub_id  INTEGER PRIMARY KEY,
    name    TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS form (
    form_id   INTEGER PRIMARY KEY,
    form_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS book (
    book_id  INTEGER PRIMARY KEY,
    title    TEXT NOT NULL CHECK (length(title) BETWEEN 1 AND 100),
    year     INTEGER,
    pub_id   INTEGER REFERENCES publisher (pub_id) ON DELETE SET NULL ON UPDATE CASCADE,
    form_id  INTEGER REFERENCES form (form_id) ON DELETE SET NULL ON UPDATE CASCADE,
    favorite INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS file (
    file_id   INTEGER PRIMARY KEY,
    book_id   INTEGER NOT NULL REFERENCES book (book_id) ON DELETE CASCADE ON UPDATE CASCADE,
    filepath  TEXT NOT NULL UNIQUE,
    num_pages INTEGER,
    subname   TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS topic (
    topic_name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS subtopic_of (
    basetopic_name TEXT NOT NULL REFERENCES topic (topic_name) ON DELETE CASCADE ON UPDATE CASCADE,
    subtopic_name  TEXT NOT NULL REFERENCES topic (topic_name) ON DELETE CASCADE ON UPDATE CASCADE,
    PRIMARY KEY (basetopic_name, subtopic_name)
);

CREATE TABLE IF NOT EXISTS book_topic (
    book_id    INTEGER NOT NULL REFERENCES book (book_id) ON DELETE CASCADE ON UPDATE CASCADE,
    topic_name TEXT NOT NULL REFERENCES topic (topic_name) ON DELETE CASCADE ON UPDATE CASCADE,
    PRIMARY KEY (book_id, topic_name)
);

CREATE TABLE IF NOT EXISTS usecase (
    usecase_id    INTEGER PRIMARY KEY,
    name          TEXT NOT NULL,
    source        TEXT,
    metadata_path TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS usecase_book (
    book_id    INTEGER NOT NULL REFERENCES book (book_id) ON DELETE CASCADE ON UPDATE CASCADE,
    usecase_id INTEGER NOT NULL REFERENCES usecase (usecase_id) ON DELETE CASCADE ON UPDATE CASCADE,
    PRIMARY KEY (book_id, usecase_id)
);

CREATE INDEX IF NOT EXISTS idx_book_form ON book (form_id);
CREATE INDEX IF NOT EXISTS idx_book_topic_topic ON book_topic (topic_name);
"#;

/// Children first, so foreign keys never block the drop.
pub const DROP_TABLES: &str = r#"
DROP TABLE IF EXISTS usecase_book;
DROP TABLE IF EXISTS usecase;
DROP TABLE IF EXISTS book_topic;
DROP TABLE IF EXISTS subtopic_of;
DROP TABLE IF EXISTS topic;
DROP TABLE IF EXISTS file;
DROP TABLE IF EXISTS book;
DROP TABLE IF EXISTS form;
DROP TABLE IF EXISTS publisher;
"#;

/// Owner registration. Lives outside the catalog tables: never dropped,
/// never written to the statement log.
pub const OWNER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS catalog_owner (
    owner_id        INTEGER PRIMARY KEY CHECK (owner_id = 1),
    user_name       TEXT NOT NULL,
    password_sha256 TEXT NOT NULL
);
"#;

/// `INSERT OR IGNORE` for every form with its fixed id.
pub fn seed_forms_sql() -> String {
    let values: Vec<String> = Form::ALL
        .iter()
        .map(|f| format!("({}, '{}')", f.id(), f.name()))
        .collect();
    format!(
        "INSERT OR IGNORE INTO form (form_id, form_name) VALUES {};",
        values.join(", ")
    )
}

/// Topics registered by a standard setup.
pub const STANDARD_TOPICS: [&str; 8] = [
    "Geography",
    "Meteorology",
    "Naval",
    "Airspace",
    "Geolocation",
    "Naval Traffic",
    "Air Traffic",
    "No-Keywords-Available-No-Title",
];

/// `(base, sub)` edges of the standard topic hierarchy.
pub const STANDARD_SUBTOPICS: [(&str, &str); 15] = [
    ("Computer Science", "Data Science"),
    ("Computer Science", "CS Tools"),
    ("Data Science", "Data Management"),
    ("Data Science", "Data Gathering"),
    ("Data Management", "SQL"),
    ("Data Science", "Artificial Intelligence"),
    ("Artificial Intelligence", "Deep Learning"),
    ("Artificial Intelligence", "Machine Learning"),
    ("Deep Learning", "LLMs"),
    ("Data Management", "Image Data"),
    ("Data Management", "Accoustic Data"),
    ("Data Management", "Text Data"),
    ("Geography", "Geolocation"),
    ("Naval", "Naval Traffic"),
    ("Airspace", "Air Traffic"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_seed_lists_every_form() {
        let sql = seed_forms_sql();
        assert!(sql.contains("(1, 'book')"));
        assert!(sql.contains("(8, 'dataset')"));
        assert!(sql.contains("(9, 'code')"));
    }

    #[test]
    fn standard_hierarchy_has_no_self_edges() {
        assert!(STANDARD_SUBTOPICS.iter().all(|(b, s)| b != s));
    }
}
