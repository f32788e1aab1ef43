use crate::record::LogEntry;
use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A sink that accepts every batch and throws it away.
///
/// It still counts what it swallowed, so load demos can compare produced
/// and shipped volume without any network I/O in the picture.
#[derive(Clone, Default)]
pub struct NoopSink {
    entries: Arc<AtomicU64>,
}

impl NoopSink {
    /// Entries accepted so far, across all clones of this sink.
    pub fn entries_seen(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LogSink for NoopSink {
    async fn send_batch(&self, batch: &[LogEntry]) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.entries.fetch_add(batch.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}
