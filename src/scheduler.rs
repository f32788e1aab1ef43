use std::time::Duration;

/// Decides when the shipper drains its queue.
///
/// Two triggers: reaching `batch_size` after a push, and a periodic tick
/// that fires for a partial batch. A full queue is left to the size trigger
/// unless its head is a batch that already failed once, which no push may
/// ever come along to retry.
#[derive(Debug, Clone, Copy)]
pub struct FlushScheduler {
    batch_size: usize,
    flush_interval: Duration,
}

impl FlushScheduler {
    pub fn new(batch_size: usize, flush_interval: Duration) -> Self {
        FlushScheduler {
            batch_size: batch_size.max(1),
            flush_interval,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Size trigger, evaluated right after an append.
    pub fn on_push(&self, queue_len: usize) -> bool {
        queue_len >= self.batch_size
    }

    /// Time trigger, evaluated on every interval tick. `retry_pending` is
    /// set while the head of the queue is a requeued batch.
    pub fn on_tick(&self, queue_len: usize, retry_pending: bool) -> bool {
        queue_len > 0 && (retry_pending || queue_len < self.batch_size)
    }
}
