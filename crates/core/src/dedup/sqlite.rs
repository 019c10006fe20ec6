//! SQLite-backed dedup repository.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::{normalize_keyword, DedupError, DedupRepository};

/// SQLite-backed dedup repository.
///
/// The global scope is mirrored in memory; every addition becomes visible
/// there first and is then written to the `global_urls` table.
pub struct SqliteDedupRepository {
    conn: Mutex<Connection>,
    global: Mutex<HashSet<String>>,
}

impl SqliteDedupRepository {
    /// Create a new repository, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, DedupError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory repository (useful for testing).
    pub fn in_memory() -> Result<Self, DedupError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DedupError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS keyword_seen (
                keyword TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                seen_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (keyword, channel_id)
            );

            CREATE TABLE IF NOT EXISTS global_urls (
                url TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS keyword_resume (
                keyword TEXT PRIMARY KEY,
                token TEXT NOT NULL
            );
            "#,
        )
        .map_err(db_err)?;

        let global = {
            let mut stmt = conn.prepare("SELECT url FROM global_urls").map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(db_err)?;
            rows.collect::<Result<HashSet<_>, _>>().map_err(db_err)?
        };

        Ok(Self {
            conn: Mutex::new(conn),
            global: Mutex::new(global),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn global(&self) -> MutexGuard<'_, HashSet<String>> {
        self.global.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn db_err(e: rusqlite::Error) -> DedupError {
    DedupError::Database(e.to_string())
}

impl DedupRepository for SqliteDedupRepository {
    fn has_seen_for_keyword(&self, keyword: &str, channel_id: &str) -> Result<bool, DedupError> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM keyword_seen WHERE keyword = ?1 AND channel_id = ?2",
                params![normalize_keyword(keyword), channel_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    fn record_seen_for_keyword(&self, keyword: &str, channel_id: &str) -> Result<(), DedupError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO keyword_seen (keyword, channel_id) VALUES (?1, ?2)",
                params![normalize_keyword(keyword), channel_id],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn has_global_url(&self, url: &str) -> Result<bool, DedupError> {
        Ok(self.global().contains(url))
    }

    fn record_global_url(&self, url: &str) -> Result<(), DedupError> {
        if !self.global().insert(url.to_string()) {
            return Ok(());
        }
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO global_urls (url) VALUES (?1)",
                params![url],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn replace_global_urls(&self, urls: Vec<String>) -> Result<usize, DedupError> {
        let mut global = self.global();
        let set: HashSet<String> = urls.into_iter().filter(|u| !u.is_empty()).collect();

        let mut conn = self.conn();
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute("DELETE FROM global_urls", []).map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare("INSERT OR IGNORE INTO global_urls (url) VALUES (?1)")
                .map_err(db_err)?;
            for url in &set {
                stmt.execute(params![url]).map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;

        let count = set.len();
        *global = set;
        Ok(count)
    }

    fn global_len(&self) -> usize {
        self.global().len()
    }

    fn resume_token(&self, keyword: &str) -> Result<Option<String>, DedupError> {
        self.conn()
            .query_row(
                "SELECT token FROM keyword_resume WHERE keyword = ?1",
                params![normalize_keyword(keyword)],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
    }

    fn store_resume_token(&self, keyword: &str, token: Option<&str>) -> Result<(), DedupError> {
        let conn = self.conn();
        let key = normalize_keyword(keyword);
        match token {
            Some(token) => conn.execute(
                "INSERT INTO keyword_resume (keyword, token) VALUES (?1, ?2)
                 ON CONFLICT(keyword) DO UPDATE SET token = excluded.token",
                params![key, token],
            ),
            None => conn.execute(
                "DELETE FROM keyword_resume WHERE keyword = ?1",
                params![key],
            ),
        }
        .map_err(db_err)?;
        Ok(())
    }
}
