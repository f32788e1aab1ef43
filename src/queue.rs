use crate::record::LogEntry;
use std::collections::VecDeque;

/// FIFO buffer of [`LogEntry`] with a hard capacity.
///
/// Pushing past the capacity evicts the oldest entry, one per entry over the
/// bound. Eviction is silent; callers learn about it only through the count
/// returned by [`BoundedQueue::push`] and [`BoundedQueue::requeue_front`].
#[derive(Debug)]
pub struct BoundedQueue {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl BoundedQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        BoundedQueue {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append at the tail. Returns how many entries were evicted (0 or 1).
    pub fn push(&mut self, entry: LogEntry) -> usize {
        self.entries.push_back(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
            1
        } else {
            0
        }
    }

    /// Remove up to `max` entries from the head, in order.
    pub fn take_batch(&mut self, max: usize) -> Vec<LogEntry> {
        let n = max.min(self.entries.len());
        self.entries.drain(..n).collect()
    }

    /// Put a batch back at the head, ahead of anything enqueued since it was
    /// taken. Oldest entries are evicted until the capacity holds again;
    /// returns the number evicted.
    pub fn requeue_front(&mut self, batch: Vec<LogEntry>) -> usize {
        for entry in batch.into_iter().rev() {
            self.entries.push_front(entry);
        }
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}
