use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::JournalEvent;

/// Envelope wrapping a journal event with its emission time
#[derive(Debug, Clone)]
pub struct JournalEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: JournalEvent,
}

/// Handle for emitting journal events
///
/// Cheaply cloneable. Events go through a bounded channel to the
/// `JournalWriter`.
#[derive(Clone)]
pub struct JournalHandle {
    tx: mpsc::Sender<JournalEnvelope>,
}

impl JournalHandle {
    pub fn new(tx: mpsc::Sender<JournalEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an event. A full or closed channel is logged, never returned.
    pub async fn emit(&self, event: JournalEvent) {
        let envelope = JournalEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit journal event: {}", e);
        }
    }

    /// Try to emit without waiting for channel capacity.
    pub fn try_emit(&self, event: JournalEvent) -> bool {
        let envelope = JournalEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit journal event: {}", e);
                false
            }
        }
    }
}

/// Emit through an optional handle.
pub async fn emit_to(journal: &Option<JournalHandle>, event: JournalEvent) {
    if let Some(handle) = journal {
        handle.emit(event).await;
    }
}
