use crate::record::LogEntry;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for batches of [`LogEntry`] drained by the
/// shipper.
///
/// Implementations transport a batch to a concrete backend (the HTTP
/// collector, stdout, a test recorder, ...). The shipper calls `send_batch`
/// from its own task and never on the application's calling path.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Deliver one batch.
    ///
    /// **Parameters**
    /// - `batch`: contiguous entries in queue order, at most `batch_size` long.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the whole batch.
    /// - `Err(..)` on any failure (network error, serialization error,
    ///   non-2xx status). The shipper puts the batch back at the head of its
    ///   queue and retries it on a later trigger; there is no backoff here.
    async fn send_batch(&self, batch: &[LogEntry]) -> Result<(), Box<dyn Error + Send + Sync>>;
}
