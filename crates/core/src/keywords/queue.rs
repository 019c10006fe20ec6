//! Keyword queue manager.
//!
//! Loaded once per cycle. Every status transition is written back to the
//! keyword partition before the call returns.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::sheets::{ResultSink, SheetError};

use super::{Keyword, KeywordStatus};

pub struct KeywordQueue {
    sink: Arc<ResultSink>,
    keywords: Vec<Keyword>,
    attempted: HashSet<usize>,
}

impl KeywordQueue {
    /// Read the full keyword list. Rows without keyword text are skipped.
    pub async fn load(sink: Arc<ResultSink>) -> Result<Self, SheetError> {
        let rows = sink.read_keyword_rows().await?;
        let mut keywords = Vec::with_capacity(rows.len());

        for row in rows {
            let text = row.cell(0).trim();
            if text.is_empty() {
                warn!(row = row.index, "Skipping keyword row without keyword text");
                continue;
            }
            keywords.push(Keyword {
                text: text.to_string(),
                row: row.index,
                status: KeywordStatus::from_label(row.cell(1)),
            });
        }

        debug!(count = keywords.len(), "Loaded keyword queue");
        Ok(Self {
            sink,
            keywords,
            attempted: HashSet::new(),
        })
    }

    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    /// Count of keywords not yet `Done`.
    pub fn remaining(&self) -> usize {
        self.keywords.iter().filter(|k| !k.status.is_done()).count()
    }

    /// Next keyword not `Done` and not yet handed out this cycle.
    ///
    /// A keyword left `Processing` by a crashed run is handed out again.
    pub fn next_pending(&mut self) -> Option<Keyword> {
        let next = self
            .keywords
            .iter()
            .find(|k| !k.status.is_done() && !self.attempted.contains(&k.row))?
            .clone();
        self.attempted.insert(next.row);
        Some(next)
    }

    pub async fn mark_processing(&mut self, keyword: &Keyword) -> Result<(), SheetError> {
        self.transition(keyword, KeywordStatus::Processing).await
    }

    pub async fn mark_done(&mut self, keyword: &Keyword) -> Result<(), SheetError> {
        self.transition(keyword, KeywordStatus::Done).await
    }

    /// Put a keyword back to `Pending` so a later cycle continues it.
    pub async fn mark_pending(&mut self, keyword: &Keyword) -> Result<(), SheetError> {
        self.transition(keyword, KeywordStatus::Pending).await
    }

    pub async fn mark_error(&mut self, keyword: &Keyword, reason: &str) -> Result<(), SheetError> {
        self.transition(
            keyword,
            KeywordStatus::Error {
                note: reason.to_string(),
            },
        )
        .await
    }

    async fn transition(
        &mut self,
        keyword: &Keyword,
        status: KeywordStatus,
    ) -> Result<(), SheetError> {
        self.sink
            .write_keyword_status(keyword.row, &status.label())
            .await?;
        debug!(keyword = %keyword.text, status = %status.label(), "Keyword status updated");
        if let Some(k) = self.keywords.iter_mut().find(|k| k.row == keyword.row) {
            k.status = status;
        }
        Ok(())
    }
}
