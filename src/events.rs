use tracing::{debug, info};

use crate::doc_key::DocumentKey;

/// Notifications emitted after the index changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// A full indexing run finished.
    IndexingComplete { documents: u64 },
    /// Documents were written or removed by an incremental update.
    DocumentsChanged { keys: Vec<DocumentKey> },
}

/// Receiver for [`IndexEvent`]s.
///
/// Passed explicitly into the indexing pipeline and the incremental updater
/// so both can run without a host application.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: IndexEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: IndexEvent) {}
}

/// Reports events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: IndexEvent) {
        match event {
            IndexEvent::IndexingComplete { documents } => {
                info!(documents, "indexing complete");
            }
            IndexEvent::DocumentsChanged { keys } => {
                debug!(count = keys.len(), "documents changed");
            }
        }
    }
}
