//! Append-only statement log.
//!
//! Statements are executed with bound parameters; only the log renders the
//! parameters as SQL literals, so that the file can be replayed with
//! [`super::CatalogStore::execute_file`].

use crate::error::CatalogError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
    Bool(bool),
}

impl SqlValue {
    /// SQL literal for the log. Single quotes are doubled; booleans are
    /// written as `0`/`1` so old SQLite builds can replay them.
    pub fn literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Int(n) => n.to_string(),
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// A statement with `?` placeholders and its parameters.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: &'static str,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: &'static str, params: Vec<SqlValue>) -> Self {
        Self { sql, params }
    }

    /// The statement with every placeholder replaced by its literal.
    ///
    /// Placeholders inside quoted strings are left alone.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.sql.len() + 16 * self.params.len());
        let mut params = self.params.iter();
        let mut in_quote = false;
        for c in self.sql.chars() {
            match c {
                '\'' => {
                    in_quote = !in_quote;
                    out.push(c);
                }
                '?' if !in_quote => match params.next() {
                    Some(p) => out.push_str(&p.literal()),
                    None => out.push(c),
                },
                _ => out.push(c),
            }
        }
        out
    }
}

/// The log file. Writes are synchronous and small; each statement is one
/// line terminated by `;`.
#[derive(Debug, Clone)]
pub struct StatementLog {
    path: PathBuf,
}

impl StatementLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, sql: &str) -> Result<(), CatalogError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.error(e))?;
        let sql = sql.trim();
        let line = if sql.ends_with(';') {
            format!("{sql}\n")
        } else {
            format!("{sql};\n")
        };
        file.write_all(line.as_bytes()).map_err(|e| self.error(e))
    }

    pub fn truncate(&self) -> Result<(), CatalogError> {
        File::create(&self.path)
            .map(|_| ())
            .map_err(|e| self.error(e))
    }

    fn error(&self, source: std::io::Error) -> CatalogError {
        CatalogError::StatementLog {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_escape_quotes() {
        assert_eq!(SqlValue::from("O'Reilly").literal(), "'O''Reilly'");
        assert_eq!(SqlValue::from(None::<i64>).literal(), "NULL");
        assert_eq!(SqlValue::from(Some(2019_i64)).literal(), "2019");
        assert_eq!(SqlValue::from(true).literal(), "1");
    }

    #[test]
    fn render_substitutes_in_order() {
        let stmt = Statement::new(
            "INSERT INTO book (title, year, favorite) VALUES (?, ?, ?)",
            vec!["It's Rust".into(), SqlValue::Null, false.into()],
        );
        assert_eq!(
            stmt.render(),
            "INSERT INTO book (title, year, favorite) VALUES ('It''s Rust', NULL, 0)"
        );
    }

    #[test]
    fn render_skips_quoted_question_marks() {
        let stmt = Statement::new("SELECT '?' || ?", vec!["x".into()]);
        assert_eq!(stmt.render(), "SELECT '?' || 'x'");
    }

    #[test]
    fn append_and_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let log = StatementLog::new(dir.path().join("locallog.txt"));
        log.append("INSERT INTO topic (topic_name) VALUES ('SQL')").unwrap();
        log.append("DELETE FROM topic;").unwrap();
        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            text,
            "INSERT INTO topic (topic_name) VALUES ('SQL');\nDELETE FROM topic;\n"
        );

        log.truncate().unwrap();
        assert_eq!(std::fs::read_to_string(log.path()).unwrap(), "");
    }
}
