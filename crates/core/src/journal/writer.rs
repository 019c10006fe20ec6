use std::sync::Arc;

use tokio::sync::mpsc;

use super::{JournalEnvelope, JournalHandle, JournalRecord, JournalStore};

/// Background task that drains journal events into storage
pub struct JournalWriter {
    rx: mpsc::Receiver<JournalEnvelope>,
    store: Arc<dyn JournalStore>,
}

impl JournalWriter {
    pub fn new(rx: mpsc::Receiver<JournalEnvelope>, store: Arc<dyn JournalStore>) -> Self {
        Self { rx, store }
    }

    /// Consume events until every handle has been dropped.
    pub async fn run(mut self) {
        tracing::info!("Journal writer started");

        while let Some(envelope) = self.rx.recv().await {
            let record = JournalRecord {
                id: 0,
                timestamp: envelope.timestamp,
                event_type: envelope.event.event_type().to_string(),
                cycle_id: envelope.event.cycle_id().map(String::from),
                keyword: envelope.event.keyword().map(String::from),
                data: envelope.event,
            };

            if let Err(e) = self.store.insert(&record) {
                tracing::error!("Failed to write journal event: {}", e);
            }
        }

        tracing::info!("Journal writer shutting down");
    }
}

/// Create a journal handle and its writer.
///
/// Spawn the writer with `tokio::spawn(writer.run())`; it exits once all
/// handle clones are dropped.
pub fn create_journal_system(
    store: Arc<dyn JournalStore>,
    buffer_size: usize,
) -> (JournalHandle, JournalWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (JournalHandle::new(tx), JournalWriter::new(rx, store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{JournalEvent, JournalFilter, SqliteJournalStore};

    #[tokio::test]
    async fn test_writer_stores_events_in_order() {
        let store = Arc::new(SqliteJournalStore::in_memory().unwrap());
        let (handle, writer) = create_journal_system(store.clone(), 16);
        let writer_task = tokio::spawn(writer.run());

        handle
            .emit(JournalEvent::ServiceStarted {
                version: "0.1.0".to_string(),
                config_hash: "abc".to_string(),
            })
            .await;
        handle
            .emit(JournalEvent::CycleStarted {
                cycle_id: "c1".to_string(),
                pending_keywords: 3,
            })
            .await;
        handle
            .emit(JournalEvent::ServiceStopped {
                reason: "graceful_shutdown".to_string(),
            })
            .await;
        drop(handle);

        writer_task.await.unwrap();

        let records = store.query(&JournalFilter::new()).unwrap();
        let types: Vec<_> = records.iter().map(|r| r.event_type.as_str()).collect();
        assert_eq!(types, vec!["service_started", "cycle_started", "service_stopped"]);
        assert_eq!(records[1].cycle_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_writer_waits_for_all_handles() {
        let store = Arc::new(SqliteJournalStore::in_memory().unwrap());
        let (handle, writer) = create_journal_system(store.clone(), 16);
        let runner_handle = handle.clone();
        let writer_task = tokio::spawn(writer.run());

        drop(handle);
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        assert!(!writer_task.is_finished());

        runner_handle
            .emit(JournalEvent::ServiceStopped {
                reason: "test".to_string(),
            })
            .await;
        drop(runner_handle);

        let result =
            tokio::time::timeout(tokio::time::Duration::from_secs(1), writer_task).await;
        assert!(result.is_ok());
        assert_eq!(store.count(&JournalFilter::new()).unwrap(), 1);
    }
}
