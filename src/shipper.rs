use crate::error::ClientError;
use crate::queue::BoundedQueue;
use crate::record::LogEntry;
use crate::scheduler::FlushScheduler;
use crate::sink::LogSink;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Messages accepted by the shipper task.
#[derive(Debug)]
pub(crate) enum Command {
    Log(LogEntry),
    /// Drain everything queued; the optional sender is notified when done.
    Flush(Option<oneshot::Sender<()>>),
}

/// Settings for the shipper task.
#[derive(Clone, Debug)]
pub struct ShipperConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_queue_size: usize,
}

/// Counters shared between the shipper task and its handle.
#[derive(Debug, Default)]
pub struct ShipperStats {
    /// Entries that reached the shipper's queue.
    pub received: AtomicU64,
    /// Entries delivered by successful batch sends.
    pub delivered: AtomicU64,
    /// Entries evicted because the queue was at capacity.
    pub evicted: AtomicU64,
    /// Batch sends that failed and were requeued.
    pub failed_sends: AtomicU64,
}

/// Point-in-time copy of [`ShipperStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub received: u64,
    pub delivered: u64,
    pub evicted: u64,
    pub failed_sends: u64,
}

impl ShipperStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            failed_sends: self.failed_sends.load(Ordering::Relaxed),
        }
    }
}

/// Handle to the isolated shipper task.
///
/// The task owns the queue, the scheduler and the sink; the handle can only
/// talk to it through an unbounded channel, so sending never waits on the
/// network.
pub struct Shipper {
    sender: mpsc::UnboundedSender<Command>,
    handle: Mutex<Option<JoinHandle<()>>>,
    terminated: AtomicBool,
    stats: Arc<ShipperStats>,
}

impl Shipper {
    /// Spawn the shipper task on the current tokio runtime.
    ///
    /// Minimal thresholds are enforced for `batch_size`, `max_queue_size` and
    /// `flush_interval` to avoid degenerate configurations.
    pub fn spawn(sink: Arc<dyn LogSink>, config: ShipperConfig) -> Result<Self, ClientError> {
        let runtime = Handle::try_current()?;

        let flush_interval = config.flush_interval.max(Duration::from_millis(10));
        let scheduler = FlushScheduler::new(config.batch_size, flush_interval);
        let queue = BoundedQueue::new(config.max_queue_size);

        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(ShipperStats::default());

        let worker = Worker {
            queue,
            scheduler,
            sink,
            stats: Arc::clone(&stats),
            retry_pending: false,
        };
        let handle = runtime.spawn(worker.run(rx));

        Ok(Shipper {
            sender: tx,
            handle: Mutex::new(Some(handle)),
            terminated: AtomicBool::new(false),
            stats,
        })
    }

    /// Hand an entry to the task. Silently dropped once terminated.
    pub(crate) fn enqueue(&self, entry: LogEntry) {
        if self.is_terminated() {
            return;
        }
        let _ = self.sender.send(Command::Log(entry));
    }

    /// Ask for an unconditional drain without waiting for it.
    pub(crate) fn request_flush(&self) {
        if self.is_terminated() {
            return;
        }
        let _ = self.sender.send(Command::Flush(None));
    }

    /// Ask for a drain and get a receiver that resolves once it ran.
    ///
    /// The receiver errors out if the task is gone before acknowledging.
    pub(crate) fn flush_with_ack(&self) -> oneshot::Receiver<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if !self.is_terminated() {
            let _ = self.sender.send(Command::Flush(Some(ack_tx)));
        }
        ack_rx
    }

    /// Abort the task regardless of pending work. Returns `false` if it was
    /// already terminated.
    pub(crate) fn terminate(&self) -> bool {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return false;
        }
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        debug!("log shipper terminated");
        true
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

struct Worker {
    queue: BoundedQueue,
    scheduler: FlushScheduler,
    sink: Arc<dyn LogSink>,
    stats: Arc<ShipperStats>,
    /// The head of the queue is a batch whose last send failed.
    retry_pending: bool,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let period = self.scheduler.flush_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            batch_size = self.scheduler.batch_size(),
            capacity = self.queue.capacity(),
            "log shipper started"
        );

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Log(entry)) => {
                        self.push(entry);
                        if self.scheduler.on_push(self.queue.len()) {
                            self.ship_next_batch().await;
                        }
                    }
                    Some(Command::Flush(ack)) => {
                        self.drain().await;
                        if let Some(ack) = ack {
                            let _ = ack.send(());
                        }
                    }
                    None => {
                        // Every handle is gone: one last drain, then stop.
                        self.drain().await;
                        debug!("log shipper stopped");
                        return;
                    }
                },
                _ = ticker.tick() => {
                    if self.scheduler.on_tick(self.queue.len(), self.retry_pending) {
                        self.ship_next_batch().await;
                    }
                }
            }
        }
    }

    fn push(&mut self, entry: LogEntry) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        let evicted = self.queue.push(entry);
        if evicted > 0 {
            self.stats.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
        }
    }

    /// Send the head batch. On failure the batch goes back to the head.
    async fn ship_next_batch(&mut self) -> bool {
        let batch = self.queue.take_batch(self.scheduler.batch_size());
        if batch.is_empty() {
            return true;
        }

        match self.sink.send_batch(&batch).await {
            Ok(()) => {
                self.retry_pending = false;
                self.stats.delivered.fetch_add(batch.len() as u64, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.retry_pending = true;
                self.stats.failed_sends.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, size = batch.len(), "log batch send failed, requeueing at head");
                let evicted = self.queue.requeue_front(batch);
                if evicted > 0 {
                    self.stats.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
                    warn!(evicted, "log queue saturated, oldest entries dropped");
                }
                false
            }
        }
    }

    /// Send batches until the queue is empty or a send fails.
    async fn drain(&mut self) {
        while !self.queue.is_empty() {
            if !self.ship_next_batch().await {
                break;
            }
        }
    }
}
