//! Result sink adapter: owns the partition layouts used by the pipeline.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::pipeline::AcceptedChannelRecord;

use super::{SheetError, SheetRow, SheetStore};

/// Fixed column set of a result partition.
pub const RESULT_HEADER: [&str; 10] = [
    "Title",
    "URL",
    "Subscribers",
    "Description",
    "Contacts",
    "Date Added",
    "Shorts Ratio",
    "Video Frequency",
    "Avg Duration",
    "Status",
];

/// Column holding the channel URL in a result partition.
pub const URL_COLUMN: usize = 1;

/// Column set of the keyword partition.
pub const KEYWORD_HEADER: [&str; 2] = ["Keyword", "Status"];

/// Most tabular stores cap partition names; 100 fits all of them.
const MAX_PARTITION_NAME: usize = 100;

/// Name of the result partition for a keyword.
pub fn result_partition_name(keyword: &str) -> String {
    keyword.trim().chars().take(MAX_PARTITION_NAME).collect()
}

/// Appended to a result partition name that would collide with the keyword
/// partition.
const RESULT_SUFFIX: &str = " (results)";

/// Thin adapter over a [`SheetStore`] that knows the keyword and result layouts.
pub struct ResultSink {
    store: Arc<dyn SheetStore>,
    keyword_partition: String,
}

impl ResultSink {
    pub fn new(store: Arc<dyn SheetStore>, keyword_partition: impl Into<String>) -> Self {
        Self {
            store,
            keyword_partition: keyword_partition.into(),
        }
    }

    pub fn keyword_partition(&self) -> &str {
        &self.keyword_partition
    }

    pub fn store(&self) -> &Arc<dyn SheetStore> {
        &self.store
    }

    /// All rows of the keyword partition, creating it if absent.
    pub async fn read_keyword_rows(&self) -> Result<Vec<SheetRow>, SheetError> {
        self.store
            .ensure_partition(&self.keyword_partition, &KEYWORD_HEADER)
            .await?;
        self.store.read_rows(&self.keyword_partition).await
    }

    /// Write a keyword's status label back to its row.
    pub async fn write_keyword_status(&self, row: usize, label: &str) -> Result<(), SheetError> {
        self.store
            .update_cell(&self.keyword_partition, row, 1, label)
            .await
    }

    /// Append an accepted channel to the keyword's result partition.
    pub async fn append_accepted(
        &self,
        keyword: &str,
        record: &AcceptedChannelRecord,
    ) -> Result<(), SheetError> {
        let partition = self.result_partition(keyword);
        if self.store.ensure_partition(&partition, &RESULT_HEADER).await? {
            debug!(partition = %partition, "Created result partition");
        }
        self.store.append_row(&partition, record.to_row()).await
    }

    /// Result partition for `keyword`, never the keyword partition itself.
    pub fn result_partition(&self, keyword: &str) -> String {
        let name = result_partition_name(keyword);
        if !name.eq_ignore_ascii_case(self.keyword_partition.trim()) {
            return name;
        }
        let keep = MAX_PARTITION_NAME - RESULT_SUFFIX.chars().count();
        let mut name: String = name.chars().take(keep).collect();
        name.push_str(RESULT_SUFFIX);
        name
    }

    /// Every channel URL already written to a result partition.
    ///
    /// The keyword partition is excluded. Rows without a URL are skipped with
    /// a warning.
    pub async fn existing_urls(&self) -> Result<Vec<String>, SheetError> {
        let mut urls = Vec::new();
        for partition in self.store.list_partitions().await? {
            if partition == self.keyword_partition {
                continue;
            }
            for row in self.store.read_rows(&partition).await? {
                let url = row.cell(URL_COLUMN).trim();
                if url.is_empty() {
                    warn!(
                        partition = %partition,
                        row = row.index,
                        "Skipping result row without URL"
                    );
                    continue;
                }
                urls.push(url.to_string());
            }
        }
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::SqliteSheetStore;

    fn sink() -> ResultSink {
        ResultSink::new(Arc::new(SqliteSheetStore::in_memory().unwrap()), "Keywords")
    }

    #[test]
    fn test_result_partition_name() {
        assert_eq!(result_partition_name("  robotics "), "robotics");
        assert_eq!(result_partition_name(&"x".repeat(150)).len(), 100);
    }

    #[test]
    fn test_result_partition_avoids_keyword_partition() {
        let sink = sink();
        assert_eq!(sink.result_partition("robotics"), "robotics");
        assert_eq!(sink.result_partition("Keywords"), "Keywords (results)");
        assert_eq!(sink.result_partition(" keywords "), "keywords (results)");
    }

    #[tokio::test]
    async fn test_read_keyword_rows_creates_partition() {
        let sink = sink();
        assert!(sink.read_keyword_rows().await.unwrap().is_empty());
        assert_eq!(
            sink.store().list_partitions().await.unwrap(),
            vec!["Keywords"]
        );
    }

    #[tokio::test]
    async fn test_existing_urls_skips_keyword_partition_and_blank_urls() {
        let sink = sink();
        let store = sink.store();
        store.ensure_partition("Keywords", &KEYWORD_HEADER).await.unwrap();
        store
            .append_row("Keywords", vec!["robotics".into(), "https://not-a-result".into()])
            .await
            .unwrap();
        store.ensure_partition("robotics", &RESULT_HEADER).await.unwrap();
        store
            .append_row("robotics", vec!["A".into(), "https://a".into()])
            .await
            .unwrap();
        store
            .append_row("robotics", vec!["no url".into()])
            .await
            .unwrap();
        store.ensure_partition("drones", &RESULT_HEADER).await.unwrap();
        store
            .append_row("drones", vec!["B".into(), " https://b ".into()])
            .await
            .unwrap();

        let urls = sink.existing_urls().await.unwrap();
        assert_eq!(urls, vec!["https://a".to_string(), "https://b".to_string()]);
    }
}
