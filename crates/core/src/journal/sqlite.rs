use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{JournalError, JournalEvent, JournalFilter, JournalRecord, JournalStore};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS journal (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        event_type TEXT NOT NULL,
        cycle_id TEXT,
        keyword TEXT,
        data TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_journal_timestamp ON journal(timestamp);
    CREATE INDEX IF NOT EXISTS idx_journal_cycle_id ON journal(cycle_id);
    CREATE INDEX IF NOT EXISTS idx_journal_event_type ON journal(event_type);
"#;

/// SQLite-backed journal store
pub struct SqliteJournalStore {
    conn: Mutex<Connection>,
}

impl SqliteJournalStore {
    pub fn new(path: &Path) -> Result<Self, JournalError> {
        let conn = Connection::open(path).map_err(|e| JournalError::Database(e.to_string()))?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, JournalError> {
        let conn =
            Connection::open_in_memory().map_err(|e| JournalError::Database(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, JournalError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| JournalError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, JournalError> {
        self.conn
            .lock()
            .map_err(|_| JournalError::Database("journal connection poisoned".to_string()))
    }

    fn build_where_clause(filter: &JournalFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref cycle_id) = filter.cycle_id {
            conditions.push("cycle_id = ?");
            params.push(Box::new(cycle_id.clone()));
        }

        if let Some(ref keyword) = filter.keyword {
            conditions.push("keyword = ?");
            params.push(Box::new(keyword.clone()));
        }

        if let Some(ref event_type) = filter.event_type {
            conditions.push("event_type = ?");
            params.push(Box::new(event_type.clone()));
        }

        if let Some(ref from) = filter.from {
            conditions.push("timestamp >= ?");
            params.push(Box::new(from.to_rfc3339()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

impl JournalStore for SqliteJournalStore {
    fn insert(&self, record: &JournalRecord) -> Result<i64, JournalError> {
        let conn = self.lock()?;

        let data_json = serde_json::to_string(&record.data)
            .map_err(|e| JournalError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO journal (timestamp, event_type, cycle_id, keyword, data) VALUES (?, ?, ?, ?, ?)",
            params![
                record.timestamp.to_rfc3339(),
                record.event_type,
                record.cycle_id,
                record.keyword,
                data_json,
            ],
        )
        .map_err(|e| JournalError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &JournalFilter) -> Result<Vec<JournalRecord>, JournalError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT id, timestamp, event_type, cycle_id, keyword, data FROM journal {} ORDER BY id ASC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| JournalError::Database(e.to_string()))?;

        let mut all_params = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(|e| JournalError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_type, cycle_id, keyword, data_json) =
                row.map_err(|e| JournalError::Database(e.to_string()))?;

            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|e| JournalError::Database(format!("Invalid timestamp: {}", e)))?
                .into();
            let data: JournalEvent = serde_json::from_str(&data_json)
                .map_err(|e| JournalError::Serialization(e.to_string()))?;

            records.push(JournalRecord {
                id,
                timestamp,
                event_type,
                cycle_id,
                keyword,
                data,
            });
        }

        Ok(records)
    }

    fn count(&self, filter: &JournalFilter) -> Result<i64, JournalError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM journal {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| JournalError::Database(e.to_string()))
    }
}
