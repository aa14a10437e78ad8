//! SQLite catalog store.
//!
//! A thin executor over one live [`SqliteConnection`]. Mutations bind their
//! parameters and run inside a transaction that opens lazily on the first
//! mutation. Their rendered text is held back until the transaction
//! commits and only then appended to the [`StatementLog`]; a rollback
//! discards it, so the log always replays cleanly.
//! The caller decides when to [`commit_transaction`](CatalogStore::commit_transaction)
//! or [`cancel_transaction`](CatalogStore::cancel_transaction).
//!
//! Publisher ids, registered topics and the row counters are cached in
//! memory. A failed statement can leave the caches ahead of the database;
//! [`update_parameters`](CatalogStore::update_parameters) rebuilds them and
//! `cancel_transaction` calls it for you.

pub mod log;
pub mod schema;

pub use log::{SqlValue, Statement, StatementLog};

use crate::config::StoreConfig;
use crate::error::CatalogError;
use crate::keywords::cleanup::title_case;
use crate::model::{BookHit, Form};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteQueryResult};
use sqlx::Connection;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Longest accepted book title, in characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// A book about to be inserted.
#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub title: String,
    pub year: Option<i32>,
    pub publisher_id: Option<i64>,
    pub form: Form,
    pub topics: Vec<String>,
    pub favorite: bool,
}

pub struct CatalogStore {
    conn: SqliteConnection,
    log: Option<StatementLog>,
    in_transaction: bool,
    /// Rendered statements of the open transaction.
    pending: Vec<String>,
    /// Truncate the log before the next commit flushes `pending`.
    reset_log: bool,
    publishers: HashMap<String, i64>,
    topics: HashSet<String>,
    book_count: i64,
    publisher_count: i64,
}

impl CatalogStore {
    /// Open (or create) the database described by `config`.
    pub async fn open(config: &StoreConfig) -> Result<Self, CatalogError> {
        let options = SqliteConnectOptions::new()
            .filename(&config.database)
            .create_if_missing(true)
            .foreign_keys(true);
        let conn = SqliteConnection::connect_with(&options).await?;
        let log = config.log_file().map(StatementLog::new);
        info!("Opened catalog {}", config.database.display());
        Self::bootstrap(conn, log).await
    }

    /// A private in-memory catalog without a statement log.
    pub async fn open_in_memory() -> Result<Self, CatalogError> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);
        let conn = SqliteConnection::connect_with(&options).await?;
        Self::bootstrap(conn, None).await
    }

    async fn bootstrap(
        mut conn: SqliteConnection,
        log: Option<StatementLog>,
    ) -> Result<Self, CatalogError> {
        let setup = format!(
            "{}\n{}\n{}",
            schema::SCHEMA,
            schema::seed_forms_sql(),
            schema::OWNER_SCHEMA
        );
        sqlx::raw_sql(&setup).execute(&mut conn).await?;

        let mut store = Self {
            conn,
            log,
            in_transaction: false,
            pending: Vec::new(),
            reset_log: false,
            publishers: HashMap::new(),
            topics: HashSet::new(),
            book_count: 0,
            publisher_count: 0,
        };
        store.update_parameters().await?;
        Ok(store)
    }

    pub fn book_count(&self) -> i64 {
        self.book_count
    }

    pub fn publisher_count(&self) -> i64 {
        self.publisher_count
    }

    /// Whether `topic` is registered, according to the cache.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(StatementLog::path)
    }

    // ── Execution ─────────────────────────────────────────────────────────

    async fn begin_if_needed(&mut self) -> Result<(), CatalogError> {
        if !self.in_transaction {
            sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql("BEGIN")).await?;
            self.in_transaction = true;
        }
        Ok(())
    }

    fn record(&mut self, sql: String) {
        if self.log.is_some() {
            self.pending.push(sql);
        }
    }

    /// Write the statements of a committed transaction to the log.
    fn flush_log(&mut self) -> Result<(), CatalogError> {
        let pending = std::mem::take(&mut self.pending);
        let reset = std::mem::take(&mut self.reset_log);
        let Some(log) = &self.log else {
            return Ok(());
        };
        if reset {
            log.truncate()?;
        }
        for sql in &pending {
            log.append(sql)?;
        }
        Ok(())
    }

    fn discard_log(&mut self) {
        if !self.pending.is_empty() {
            debug!("Discarding {} uncommitted log statements", self.pending.len());
        }
        self.pending.clear();
        self.reset_log = false;
    }

    async fn run(&mut self, stmt: Statement) -> Result<SqliteQueryResult, CatalogError> {
        self.begin_if_needed().await?;
        let mut query = sqlx::query(stmt.sql);
        for param in &stmt.params {
            query = match param {
                SqlValue::Null => query.bind(None::<i64>),
                SqlValue::Int(n) => query.bind(*n),
                SqlValue::Text(s) => query.bind(s.clone()),
                SqlValue::Bool(b) => query.bind(*b),
            };
        }
        let result = query.execute(&mut self.conn).await?;
        let rendered = stmt.render();
        debug!("SQL: {}", rendered);
        self.record(rendered);
        Ok(result)
    }

    /// Run raw SQL (one or more statements). Returns the rows affected.
    pub async fn execute(&mut self, sql: &str) -> Result<u64, CatalogError> {
        self.begin_if_needed().await?;
        let result = sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(sql)).await?;
        self.record(sql.to_string());
        Ok(result.rows_affected())
    }

    /// Run every statement of a SQL file, typically a statement log.
    ///
    /// With `update_params` the transaction is committed and the caches are
    /// rebuilt afterwards.
    pub async fn execute_file(
        &mut self,
        path: &Path,
        update_params: bool,
    ) -> Result<u64, CatalogError> {
        let sql = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::io(path, e))?;
        info!("Executing {}", path.display());
        let affected = self.execute(&sql).await?;
        if update_params {
            self.update_parameters().await?;
        }
        Ok(affected)
    }

    // ── Transactions ──────────────────────────────────────────────────────

    /// Commit the open transaction and append its statements to the log.
    pub async fn commit_transaction(&mut self) -> Result<(), CatalogError> {
        if self.in_transaction {
            sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql("COMMIT")).await?;
            self.in_transaction = false;
            self.flush_log()?;
        }
        Ok(())
    }

    /// Roll back the open transaction and resynchronise the caches.
    pub async fn cancel_transaction(&mut self) -> Result<(), CatalogError> {
        if self.in_transaction {
            sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql("ROLLBACK")).await?;
            self.in_transaction = false;
        }
        self.discard_log();
        self.update_parameters().await
    }

    /// Commit, then rebuild the caches from the database.
    pub async fn update_parameters(&mut self) -> Result<(), CatalogError> {
        self.commit_transaction().await?;

        self.book_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM book")
            .fetch_one(&mut self.conn)
            .await?;
        let publishers =
            sqlx::query_as::<_, (i64, String)>("SELECT pub_id, name FROM publisher")
                .fetch_all(&mut self.conn)
                .await?;
        self.publisher_count = publishers.len() as i64;
        self.publishers = publishers
            .into_iter()
            .map(|(id, name)| (name.to_lowercase(), id))
            .collect();
        self.topics = sqlx::query_scalar::<_, String>("SELECT topic_name FROM topic")
            .fetch_all(&mut self.conn)
            .await?
            .into_iter()
            .collect();
        debug!(
            "Catalog parameters: {} books, {} publishers, {} topics",
            self.book_count,
            self.publisher_count,
            self.topics.len()
        );
        Ok(())
    }

    /// Commit or roll back, then close the connection.
    pub async fn finish(mut self, commit: bool) -> Result<(), CatalogError> {
        if commit {
            self.commit_transaction().await?;
        } else if self.in_transaction {
            sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql("ROLLBACK")).await?;
            self.discard_log();
        }
        self.conn.close().await?;
        Ok(())
    }

    // ── Topics ────────────────────────────────────────────────────────────

    /// Register topics that are not registered yet. Returns how many were new.
    pub async fn add_topics<S: AsRef<str>>(&mut self, topics: &[S]) -> Result<usize, CatalogError> {
        let mut added = 0;
        for topic in topics {
            let topic = topic.as_ref().trim();
            if topic.is_empty() || self.topics.contains(topic) {
                continue;
            }
            self.run(Statement::new(
                "INSERT OR IGNORE INTO topic (topic_name) VALUES (?)",
                vec![topic.into()],
            ))
            .await?;
            self.topics.insert(topic.to_string());
            added += 1;
        }
        Ok(added)
    }

    /// Ensure `topic` is registered, registering it when `auto_register` is set.
    pub async fn check_topic(&mut self, topic: &str, auto_register: bool) -> Result<(), CatalogError> {
        if self.topics.contains(topic) {
            return Ok(());
        }
        if !auto_register {
            return Err(CatalogError::UnknownTopic {
                topic: topic.to_string(),
            });
        }
        self.add_topics(&[topic]).await.map(|_| ())
    }

    /// Record `sub` as a subtopic of `base`. Edges that would close a cycle
    /// are rejected.
    pub async fn add_subtopic(
        &mut self,
        base: &str,
        sub: &str,
        auto_register: bool,
    ) -> Result<(), CatalogError> {
        self.check_topic(base, auto_register).await?;
        self.check_topic(sub, auto_register).await?;

        let reachable: i64 = sqlx::query_scalar(
            "WITH RECURSIVE below(name) AS (
                 SELECT ?
                 UNION
                 SELECT s.subtopic_name FROM subtopic_of s JOIN below ON s.basetopic_name = below.name
             )
             SELECT COUNT(*) FROM below WHERE name = ?",
        )
        .bind(sub)
        .bind(base)
        .fetch_one(&mut self.conn)
        .await?;
        if reachable > 0 {
            return Err(CatalogError::TopicCycle {
                base: base.to_string(),
                sub: sub.to_string(),
            });
        }

        self.run(Statement::new(
            "INSERT OR IGNORE INTO subtopic_of (basetopic_name, subtopic_name) VALUES (?, ?)",
            vec![base.into(), sub.into()],
        ))
        .await?;
        Ok(())
    }

    // ── Publishers, books, files ──────────────────────────────────────────

    /// Look up or insert a publisher; names are stored lowercased.
    pub async fn add_publisher(&mut self, name: &str) -> Result<i64, CatalogError> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(CatalogError::EmptyPublisher);
        }
        if let Some(id) = self.publishers.get(&name) {
            return Ok(*id);
        }

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT pub_id FROM publisher WHERE name = ?")
                .bind(&name)
                .fetch_optional(&mut self.conn)
                .await?;
        let id = match existing {
            Some(id) => id,
            None => {
                let result = self
                    .run(Statement::new(
                        "INSERT INTO publisher (name) VALUES (?)",
                        vec![name.as_str().into()],
                    ))
                    .await?;
                self.publisher_count += 1;
                result.last_insert_rowid()
            }
        };
        self.publishers.insert(name, id);
        Ok(id)
    }

    /// Insert a book and its topic associations. Returns the new book id.
    ///
    /// The title and every topic are validated before anything is written.
    pub async fn add_book(&mut self, book: &NewBook, auto_register: bool) -> Result<i64, CatalogError> {
        let title = book.title.trim();
        if title.is_empty() {
            return Err(CatalogError::MissingTitle);
        }
        let len = title.chars().count();
        if len > MAX_TITLE_CHARS {
            return Err(CatalogError::TitleTooLong {
                title: title.to_string(),
                len,
            });
        }

        let mut topics: Vec<&str> = Vec::new();
        for topic in book.topics.iter().map(|t| t.trim()) {
            if !topic.is_empty() && !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        if !auto_register {
            if let Some(unknown) = topics.iter().find(|t| !self.topics.contains(**t)) {
                return Err(CatalogError::UnknownTopic {
                    topic: unknown.to_string(),
                });
            }
        }

        let result = self
            .run(Statement::new(
                "INSERT INTO book (title, year, pub_id, form_id, favorite) VALUES (?, ?, ?, ?, ?)",
                vec![
                    title.into(),
                    book.year.map(i64::from).into(),
                    book.publisher_id.into(),
                    book.form.id().into(),
                    book.favorite.into(),
                ],
            ))
            .await?;
        let book_id = result.last_insert_rowid();
        self.book_count += 1;

        for topic in topics {
            self.check_topic(topic, auto_register).await?;
            self.run(Statement::new(
                "INSERT OR IGNORE INTO book_topic (book_id, topic_name) VALUES (?, ?)",
                vec![book_id.into(), topic.into()],
            ))
            .await?;
        }
        Ok(book_id)
    }

    /// Attach a file to a book. File paths are unique across the catalog.
    pub async fn add_file(
        &mut self,
        book_id: i64,
        path: &Path,
        num_pages: Option<u32>,
        subname: &str,
    ) -> Result<i64, CatalogError> {
        let result = self
            .run(Statement::new(
                "INSERT INTO file (book_id, filepath, num_pages, subname) VALUES (?, ?, ?, ?)",
                vec![
                    book_id.into(),
                    path.to_string_lossy().into_owned().into(),
                    num_pages.map(i64::from).into(),
                    subname.into(),
                ],
            ))
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Whether a file with this path is already catalogued.
    pub async fn has_file(&mut self, path: &Path) -> Result<bool, CatalogError> {
        let hits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file WHERE filepath = ?")
            .bind(path.to_string_lossy().into_owned())
            .fetch_one(&mut self.conn)
            .await?;
        Ok(hits > 0)
    }

    /// Set the favorite flag. Returns `false` when no book has that id.
    pub async fn set_favorite(&mut self, book_id: i64, favorite: bool) -> Result<bool, CatalogError> {
        let result = self
            .run(Statement::new(
                "UPDATE book SET favorite = ? WHERE book_id = ?",
                vec![favorite.into(), book_id.into()],
            ))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Books of `form` (all forms for `None`) carrying topic `kw`.
    ///
    /// `kw` matches topic names case-insensitively; `*` matches every book
    /// and an empty `kw` matches none. An empty result is the single
    /// [`BookHit::no_match`] sentinel.
    pub async fn query_books(&mut self, kw: &str, form: Option<Form>) -> Result<Vec<BookHit>, CatalogError> {
        let form_id = form.map(Form::id);
        let rows = sqlx::query_as::<_, (i64, String, Option<String>, bool)>(
            "SELECT b.book_id, b.title, p.name, b.favorite
             FROM book b LEFT JOIN publisher p ON p.pub_id = b.pub_id
             WHERE ? IS NULL OR b.form_id = ?
             ORDER BY b.book_id",
        )
        .bind(form_id)
        .bind(form_id)
        .fetch_all(&mut self.conn)
        .await?;

        let mut topics_by_book: HashMap<i64, Vec<String>> = HashMap::new();
        let pairs = sqlx::query_as::<_, (i64, String)>(
            "SELECT book_id, topic_name FROM book_topic ORDER BY book_id, topic_name",
        )
        .fetch_all(&mut self.conn)
        .await?;
        for (book_id, topic) in pairs {
            topics_by_book.entry(book_id).or_default().push(topic);
        }

        let kw = kw.trim().to_lowercase();
        let mut hits = Vec::new();
        for (id, title, publisher, favourite) in rows {
            let keywords = topics_by_book.remove(&id).unwrap_or_default();
            let matches = match kw.as_str() {
                "*" => true,
                "" => false,
                kw => keywords.iter().any(|t| t.to_lowercase() == kw),
            };
            if !matches {
                continue;
            }
            hits.push(BookHit {
                id: Some(id),
                title,
                author: publisher
                    .map(|p| title_case(&format!("published by {p}")))
                    .unwrap_or_default(),
                keywords,
                favourite,
            });
        }

        if hits.is_empty() {
            hits.push(BookHit::no_match());
        }
        Ok(hits)
    }

    // ── Schema lifecycle ──────────────────────────────────────────────────

    /// Drop and recreate every catalog table. The log is truncated when the
    /// reset commits. The owner registration survives.
    pub async fn clear(&mut self) -> Result<(), CatalogError> {
        warn!("Clearing catalog");
        self.begin_if_needed().await?;
        self.pending.clear();
        self.reset_log = true;
        self.execute(schema::DROP_TABLES).await?;
        self.execute(schema::SCHEMA).await?;
        self.execute(&schema::seed_forms_sql()).await?;
        self.update_parameters().await
    }

    /// Seed the forms, the standard topics and their hierarchy, then commit.
    pub async fn standard_setup(&mut self) -> Result<(), CatalogError> {
        self.execute(&schema::seed_forms_sql()).await?;
        self.add_topics(&schema::STANDARD_TOPICS).await?;
        for (base, sub) in schema::STANDARD_SUBTOPICS {
            self.add_subtopic(base, sub, true).await?;
        }
        self.update_parameters().await
    }

    // ── Owner ─────────────────────────────────────────────────────────────

    /// Register (or replace) the catalog owner and commit.
    ///
    /// Only a SHA-256 digest of the password is stored and nothing is logged.
    pub async fn set_owner(&mut self, user: &str, password: &str) -> Result<(), CatalogError> {
        self.begin_if_needed().await?;
        sqlx::query(
            "INSERT OR REPLACE INTO catalog_owner (owner_id, user_name, password_sha256) VALUES (1, ?, ?)",
        )
        .bind(user)
        .bind(password_digest(user, password))
        .execute(&mut self.conn)
        .await?;
        self.commit_transaction().await?;
        info!("Registered catalog owner '{}'", user);
        Ok(())
    }

    pub async fn owner(&mut self) -> Result<Option<String>, CatalogError> {
        let name = sqlx::query_scalar::<_, String>(
            "SELECT user_name FROM catalog_owner WHERE owner_id = 1",
        )
        .fetch_optional(&mut self.conn)
        .await?;
        Ok(name)
    }

    /// Check credentials against the registered owner.
    pub async fn verify_owner(&mut self, user: &str, password: &str) -> Result<bool, CatalogError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT user_name, password_sha256 FROM catalog_owner WHERE owner_id = 1",
        )
        .fetch_optional(&mut self.conn)
        .await?;
        let (stored_user, stored_digest) = row.ok_or(CatalogError::NoOwner)?;
        Ok(stored_user == user && stored_digest == password_digest(user, password))
    }
}

fn password_digest(user: &str, password: &str) -> String {
    hex::encode(Sha256::digest(format!("{user}:{password}").as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn count(store: &mut CatalogStore, sql: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&mut store.conn)
            .await
            .unwrap()
    }

    fn book(title: &str, topics: &[&str]) -> NewBook {
        NewBook {
            title: title.to_string(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn open_seeds_forms() {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM form").await, 9);
        assert_eq!(store.book_count(), 0);
        assert!(!store.in_transaction());
    }

    #[tokio::test]
    async fn long_title_is_rejected_without_mutation() {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        let err = store
            .add_book(&book(&"x".repeat(101), &["Brand New"]), true)
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(!store.in_transaction());
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM book").await, 0);
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM topic").await, 0);

        // Exactly 100 characters, multi-byte included, is fine.
        let title = "é".repeat(100);
        store.add_book(&book(&title, &[]), true).await.unwrap();
        assert_eq!(store.book_count(), 1);
    }

    #[tokio::test]
    async fn empty_title_is_rejected() {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        let err = store.add_book(&book("   ", &[]), true).await.unwrap_err();
        assert!(matches!(err, CatalogError::MissingTitle));
    }

    #[tokio::test]
    async fn unknown_topic_without_auto_register_inserts_nothing() {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        let err = store.check_topic("Quantum", false).await.unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM topic").await, 0);

        let err = store
            .add_book(&book("Quantum Computing", &["Quantum"]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownTopic { .. }));
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM book").await, 0);

        store.check_topic("Quantum", true).await.unwrap();
        assert!(store.has_topic("Quantum"));
        store.check_topic("Quantum", false).await.unwrap();
    }

    #[tokio::test]
    async fn publishers_are_lowercased_and_reused() {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        let a = store.add_publisher("Springer").await.unwrap();
        let b = store.add_publisher("  SPRINGER ").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.publisher_count(), 1);
        let name: String = sqlx::query_scalar("SELECT name FROM publisher")
            .fetch_one(&mut store.conn)
            .await
            .unwrap();
        assert_eq!(name, "springer");
        assert!(matches!(
            store.add_publisher(" ").await,
            Err(CatalogError::EmptyPublisher)
        ));
    }

    #[tokio::test]
    async fn query_filters_by_topic_and_form() {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        let springer = store.add_publisher("Springer").await.unwrap();
        store
            .add_book(
                &NewBook {
                    publisher_id: Some(springer),
                    year: Some(2019),
                    ..book("Deep Learning Basics", &["Deep Learning", "Deep Learning"])
                },
                true,
            )
            .await
            .unwrap();
        store
            .add_book(
                &NewBook {
                    form: Form::Notes,
                    ..book("Lecture Notes", &["SQL"])
                },
                true,
            )
            .await
            .unwrap();
        store.commit_transaction().await.unwrap();

        let all = store.query_books("*", None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].author, "Published By Springer");
        assert_eq!(all[0].keywords, vec!["Deep Learning"]);
        assert_eq!(all[1].author, "");

        let hits = store.query_books("deep learning", None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Deep Learning Basics");

        let notes = store.query_books("*", Some(Form::Notes)).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Lecture Notes");

        let none = store.query_books("Botany", None).await.unwrap();
        assert_eq!(none, vec![BookHit::no_match()]);
        let empty = store.query_books("", None).await.unwrap();
        assert!(empty[0].is_no_match());
    }

    #[tokio::test]
    async fn cascades() {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        let pub_id = store.add_publisher("Packt").await.unwrap();
        let book_id = store
            .add_book(
                &NewBook {
                    publisher_id: Some(pub_id),
                    ..book("Rust in Action", &["Systems", "Rust"])
                },
                true,
            )
            .await
            .unwrap();
        store
            .add_file(book_id, Path::new("/lib/rust.pdf"), Some(300), "")
            .await
            .unwrap();
        store.add_subtopic("Systems", "Rust", false).await.unwrap();
        store.commit_transaction().await.unwrap();

        // Publisher deletion nulls the reference.
        store.execute("DELETE FROM publisher").await.unwrap();
        let nulls = count(&mut store, "SELECT COUNT(*) FROM book WHERE pub_id IS NULL").await;
        assert_eq!(nulls, 1);

        // Topic deletion cascades to edges and associations.
        store
            .execute("DELETE FROM topic WHERE topic_name = 'Rust'")
            .await
            .unwrap();
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM subtopic_of").await, 0);
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM book_topic").await, 1);

        // Book deletion cascades to files and associations.
        store.execute("DELETE FROM book").await.unwrap();
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM file").await, 0);
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM book_topic").await, 0);
    }

    #[tokio::test]
    async fn duplicate_file_path_and_cancel() {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        let first = store.add_book(&book("First", &[]), true).await.unwrap();
        store
            .add_file(first, Path::new("/lib/a.pdf"), None, "")
            .await
            .unwrap();
        store.commit_transaction().await.unwrap();
        assert!(store.has_file(Path::new("/lib/a.pdf")).await.unwrap());
        assert!(!store.has_file(Path::new("/lib/b.pdf")).await.unwrap());

        let second = store.add_book(&book("Second", &["Fresh"]), true).await.unwrap();
        let err = store
            .add_file(second, Path::new("/lib/a.pdf"), None, "")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Database(_)));
        assert!(store.in_transaction());

        store.cancel_transaction().await.unwrap();
        assert_eq!(store.book_count(), 1);
        assert!(!store.has_topic("Fresh"));
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM book").await, 1);
    }

    #[tokio::test]
    async fn subtopic_cycles_are_rejected() {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        store.add_subtopic("A", "B", true).await.unwrap();
        store.add_subtopic("B", "C", true).await.unwrap();
        let err = store.add_subtopic("C", "A", true).await.unwrap_err();
        assert!(matches!(err, CatalogError::TopicCycle { .. }));
        assert!(store.add_subtopic("A", "A", true).await.is_err());
    }

    #[tokio::test]
    async fn set_favorite_reports_missing_rows() {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        let id = store.add_book(&book("Fav", &[]), true).await.unwrap();
        assert!(store.set_favorite(id, true).await.unwrap());
        assert!(!store.set_favorite(id + 100, true).await.unwrap());
        let hits = store.query_books("*", None).await.unwrap();
        assert!(hits[0].favourite);
    }

    #[tokio::test]
    async fn standard_setup_registers_hierarchy() {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        store.standard_setup().await.unwrap();
        assert!(store.has_topic("Naval Traffic"));
        assert!(store.has_topic("Computer Science"));
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM subtopic_of").await, 15);
        // Idempotent.
        store.standard_setup().await.unwrap();
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM subtopic_of").await, 15);
    }

    #[tokio::test]
    async fn log_replays_into_a_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("catalog.db"));
        let mut store = CatalogStore::open(&config).await.unwrap();
        let pub_id = store.add_publisher("O'Reilly").await.unwrap();
        store
            .add_book(
                &NewBook {
                    publisher_id: Some(pub_id),
                    ..book("Learning SQL", &["SQL"])
                },
                true,
            )
            .await
            .unwrap();
        store.finish(true).await.unwrap();

        let log_path = dir.path().join(StoreConfig::DEFAULT_LOG_NAME);
        let text = std::fs::read_to_string(&log_path).unwrap();
        assert!(text.contains("'o''reilly'"), "log was: {text}");

        let mut replica = CatalogStore::open_in_memory().await.unwrap();
        replica.execute_file(&log_path, true).await.unwrap();
        assert_eq!(replica.book_count(), 1);
        assert_eq!(replica.publisher_count(), 1);
        assert!(replica.has_topic("SQL"));
    }

    #[tokio::test]
    async fn log_replays_after_cancelled_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("catalog.db"));
        let mut store = CatalogStore::open(&config).await.unwrap();

        // First file of a new publisher is rejected after the publisher insert.
        let pub_id = store.add_publisher("Springer").await.unwrap();
        let err = store
            .add_book(
                &NewBook {
                    publisher_id: Some(pub_id),
                    ..book(&"x".repeat(120), &[])
                },
                true,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::TitleTooLong { .. }));
        store.cancel_transaction().await.unwrap();

        let pub_id = store.add_publisher("Springer").await.unwrap();
        store
            .add_book(
                &NewBook {
                    publisher_id: Some(pub_id),
                    ..book("Kept", &["Algebra"])
                },
                true,
            )
            .await
            .unwrap();
        store.finish(true).await.unwrap();

        let log_path = dir.path().join(StoreConfig::DEFAULT_LOG_NAME);
        let text = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(text.matches("'springer'").count(), 1, "log was: {text}");

        let mut replica = CatalogStore::open_in_memory().await.unwrap();
        replica.execute_file(&log_path, true).await.unwrap();
        assert_eq!(replica.book_count(), 1);
        assert_eq!(replica.publisher_count(), 1);
        assert!(replica.has_topic("Algebra"));
    }

    #[tokio::test]
    async fn log_is_written_only_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("catalog.db"));
        let mut store = CatalogStore::open(&config).await.unwrap();
        let log_path = dir.path().join(StoreConfig::DEFAULT_LOG_NAME);

        store.add_book(&book("Pending", &[]), true).await.unwrap();
        let before = std::fs::read_to_string(&log_path).unwrap_or_default();
        assert!(!before.contains("Pending"));

        store.commit_transaction().await.unwrap();
        let after = std::fs::read_to_string(&log_path).unwrap();
        assert!(after.contains("'Pending'"));
    }

    #[tokio::test]
    async fn failed_clear_keeps_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("catalog.db"));
        let mut store = CatalogStore::open(&config).await.unwrap();
        let id = store.add_book(&book("Kept", &[]), true).await.unwrap();
        // A table outside the catalog schema pins the book row, so dropping
        // `book` violates its foreign key.
        store
            .execute("CREATE TABLE loan (book_id INTEGER NOT NULL REFERENCES book (book_id))")
            .await
            .unwrap();
        store
            .execute(&format!("INSERT INTO loan (book_id) VALUES ({id})"))
            .await
            .unwrap();
        store.commit_transaction().await.unwrap();

        assert!(store.clear().await.is_err());
        store.cancel_transaction().await.unwrap();

        assert_eq!(store.book_count(), 1);
        let text = std::fs::read_to_string(store.log_path().unwrap()).unwrap();
        assert!(text.contains("'Kept'"), "log was: {text}");
        assert!(!text.contains("DROP TABLE"));
    }

    #[tokio::test]
    async fn clear_keeps_owner_and_truncates_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("catalog.db"));
        let mut store = CatalogStore::open(&config).await.unwrap();
        store.set_owner("ada", "secret").await.unwrap();
        store.add_book(&book("Gone Soon", &["Old"]), true).await.unwrap();
        store.commit_transaction().await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.book_count(), 0);
        assert!(!store.has_topic("Old"));
        assert_eq!(count(&mut store, "SELECT COUNT(*) FROM form").await, 9);
        assert_eq!(store.owner().await.unwrap().as_deref(), Some("ada"));

        let text = std::fs::read_to_string(store.log_path().unwrap()).unwrap();
        assert!(!text.contains("Gone Soon"));
        assert!(text.contains("DROP TABLE IF EXISTS book"));
        assert!(!text.contains("catalog_owner"));
    }

    #[tokio::test]
    async fn owner_verification() {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        assert!(matches!(
            store.verify_owner("ada", "secret").await,
            Err(CatalogError::NoOwner)
        ));
        assert_eq!(store.owner().await.unwrap(), None);

        store.set_owner("ada", "secret").await.unwrap();
        assert!(store.verify_owner("ada", "secret").await.unwrap());
        assert!(!store.verify_owner("ada", "wrong").await.unwrap());
        assert!(!store.verify_owner("bob", "secret").await.unwrap());
    }
}
