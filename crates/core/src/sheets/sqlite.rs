//! SQLite-backed tabular store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{SheetError, SheetRow, SheetStore};

/// SQLite-backed tabular store.
pub struct SqliteSheetStore {
    conn: Mutex<Connection>,
}

impl SqliteSheetStore {
    /// Create a new store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, SheetError> {
        let conn = Connection::open(path).map_err(unavailable)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, SheetError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), SheetError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sheet_partitions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                header TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sheet_rows (
                partition TEXT NOT NULL,
                row_index INTEGER NOT NULL,
                cells TEXT NOT NULL,
                PRIMARY KEY (partition, row_index)
            );
            "#,
        )
        .map_err(unavailable)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn partition_exists(conn: &Connection, name: &str) -> Result<bool, SheetError> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT seq FROM sheet_partitions WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(unavailable)?;
        Ok(found.is_some())
    }
}

fn unavailable(e: rusqlite::Error) -> SheetError {
    SheetError::Unavailable(e.to_string())
}

fn encode_cells(cells: &[String]) -> Result<String, SheetError> {
    serde_json::to_string(cells).map_err(|e| SheetError::Unavailable(e.to_string()))
}

#[async_trait]
impl SheetStore for SqliteSheetStore {
    async fn list_partitions(&self) -> Result<Vec<String>, SheetError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT name FROM sheet_partitions ORDER BY seq")
            .map_err(unavailable)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(unavailable)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(unavailable)?;
        Ok(names)
    }

    async fn ensure_partition(&self, name: &str, header: &[&str]) -> Result<bool, SheetError> {
        let conn = self.conn();
        if Self::partition_exists(&conn, name)? {
            return Ok(false);
        }
        let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
        conn.execute(
            "INSERT INTO sheet_partitions (name, header) VALUES (?1, ?2)",
            params![name, encode_cells(&header)?],
        )
        .map_err(unavailable)?;
        Ok(true)
    }

    async fn read_rows(&self, name: &str) -> Result<Vec<SheetRow>, SheetError> {
        let conn = self.conn();
        if !Self::partition_exists(&conn, name)? {
            return Err(SheetError::PartitionNotFound(name.to_string()));
        }

        let mut stmt = conn
            .prepare("SELECT row_index, cells FROM sheet_rows WHERE partition = ?1 ORDER BY row_index")
            .map_err(unavailable)?;
        let rows = stmt
            .query_map(params![name], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(unavailable)?;

        let mut result = Vec::new();
        for row in rows {
            let (index, cells_json) = row.map_err(unavailable)?;
            // A row that fails to decode is surfaced as empty and left for
            // the caller to skip.
            let cells: Vec<String> = serde_json::from_str(&cells_json).unwrap_or_default();
            result.push(SheetRow {
                index: index as usize,
                cells,
            });
        }
        Ok(result)
    }

    async fn append_row(&self, name: &str, cells: Vec<String>) -> Result<(), SheetError> {
        let conn = self.conn();
        if !Self::partition_exists(&conn, name)? {
            return Err(SheetError::PartitionNotFound(name.to_string()));
        }
        conn.execute(
            r#"
            INSERT INTO sheet_rows (partition, row_index, cells)
            VALUES (?1, (SELECT COALESCE(MAX(row_index) + 1, 0) FROM sheet_rows WHERE partition = ?1), ?2)
            "#,
            params![name, encode_cells(&cells)?],
        )
        .map_err(unavailable)?;
        Ok(())
    }

    async fn update_cell(
        &self,
        name: &str,
        row: usize,
        column: usize,
        value: &str,
    ) -> Result<(), SheetError> {
        let conn = self.conn();
        let cells_json: Option<String> = conn
            .query_row(
                "SELECT cells FROM sheet_rows WHERE partition = ?1 AND row_index = ?2",
                params![name, row as i64],
                |r| r.get(0),
            )
            .optional()
            .map_err(unavailable)?;

        let Some(cells_json) = cells_json else {
            return Err(SheetError::RowNotFound {
                partition: name.to_string(),
                row,
            });
        };

        let mut cells: Vec<String> = serde_json::from_str(&cells_json).unwrap_or_default();
        if cells.len() <= column {
            cells.resize(column + 1, String::new());
        }
        cells[column] = value.to_string();

        conn.execute(
            "UPDATE sheet_rows SET cells = ?1 WHERE partition = ?2 AND row_index = ?3",
            params![encode_cells(&cells)?, name, row as i64],
        )
        .map_err(unavailable)?;
        Ok(())
    }
}
