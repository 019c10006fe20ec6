//! Tabular store collaborator and the result sink adapter.
//!
//! The external store is modelled as named partitions (sheets), each with a
//! fixed header row followed by data rows.

mod result_sink;
mod sqlite;

pub use result_sink::{
    result_partition_name, ResultSink, KEYWORD_HEADER, RESULT_HEADER, URL_COLUMN,
};
pub use sqlite::SqliteSheetStore;

use async_trait::async_trait;
use thiserror::Error;

/// A data row and its position within the partition (header excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub index: usize,
    pub cells: Vec<String>,
}

impl SheetRow {
    /// Cell value, or "" when the row is shorter than `column`.
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    #[error("Row {row} not found in partition {partition}")]
    RowNotFound { partition: String, row: usize },

    #[error("Tabular store unavailable: {0}")]
    Unavailable(String),
}

/// Trait for tabular store backends.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Names of all partitions, in creation order.
    async fn list_partitions(&self) -> Result<Vec<String>, SheetError>;

    /// Create the partition with `header` if absent. Returns true if created.
    async fn ensure_partition(&self, name: &str, header: &[&str]) -> Result<bool, SheetError>;

    /// All data rows of a partition, in order.
    async fn read_rows(&self, name: &str) -> Result<Vec<SheetRow>, SheetError>;

    async fn append_row(&self, name: &str, cells: Vec<String>) -> Result<(), SheetError>;

    async fn update_cell(
        &self,
        name: &str,
        row: usize,
        column: usize,
        value: &str,
    ) -> Result<(), SheetError>;
}
