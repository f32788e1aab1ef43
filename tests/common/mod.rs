#![allow(dead_code)]

use async_trait::async_trait;
use log_collector::sink::LogSink;
use log_collector::{ClientConfig, LogEntry};
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory sink that records every attempt and can be told to fail.
#[derive(Default)]
pub struct RecordingSink {
    attempted: Mutex<Vec<Vec<LogEntry>>>,
    delivered: Mutex<Vec<Vec<LogEntry>>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> Vec<Vec<LogEntry>> {
        self.attempted.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<Vec<LogEntry>> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.batches().into_iter().flatten().collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }
}

#[async_trait]
impl LogSink for RecordingSink {
    async fn send_batch(&self, batch: &[LogEntry]) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.attempted.lock().unwrap().push(batch.to_vec());
        if self.failing.load(Ordering::SeqCst) {
            return Err("collector unavailable".into());
        }
        self.delivered.lock().unwrap().push(batch.to_vec());
        Ok(())
    }
}

/// Sink whose sends never complete.
pub struct StalledSink;

#[async_trait]
impl LogSink for StalledSink {
    async fn send_batch(&self, _batch: &[LogEntry]) -> Result<(), Box<dyn Error + Send + Sync>> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

pub fn test_config(batch_size: usize, flush_interval: Duration) -> ClientConfig {
    ClientConfig {
        service: Some("checkout".to_string()),
        batch_size,
        flush_interval,
        ..ClientConfig::default()
    }
}
