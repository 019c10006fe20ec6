use chrono::{DateTime, Utc};
use thiserror::Error;

use super::JournalRecord;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Filter for querying journal records
#[derive(Debug, Clone, Default)]
pub struct JournalFilter {
    pub cycle_id: Option<String>,
    pub keyword: Option<String>,
    pub event_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl JournalFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    pub fn with_cycle_id(mut self, cycle_id: impl Into<String>) -> Self {
        self.cycle_id = Some(cycle_id.into());
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Trait for journal storage
pub trait JournalStore: Send + Sync {
    /// Insert a record, returns the assigned ID
    fn insert(&self, record: &JournalRecord) -> Result<i64, JournalError>;

    /// Query records, oldest first
    fn query(&self, filter: &JournalFilter) -> Result<Vec<JournalRecord>, JournalError>;

    fn count(&self, filter: &JournalFilter) -> Result<i64, JournalError>;
}
