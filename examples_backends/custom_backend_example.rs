use std::sync::Arc;

use async_trait::async_trait;
use log_collector::{
    metadata,
    sink::LogSink,
    ClientConfig, LogClient, LogEntry, REQUEST_CONTEXT,
};

/// Example of shipping batches somewhere other than the HTTP collector by
/// implementing the `LogSink` trait directly. Imagine this talks to some
/// proprietary store for which this crate does not provide a built-in
/// sink.
struct StdoutJsonSink;

#[async_trait]
impl LogSink for StdoutJsonSink {
    async fn send_batch(&self, batch: &[LogEntry]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for entry in batch {
            println!("[my-custom-store] {}", serde_json::to_string(entry)?);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let client = LogClient::with_sink(
        ClientConfig::default().with_service("custom-backend-demo"),
        Arc::new(StdoutJsonSink),
    )
    .expect("log client");

    client.info("custom backend example started", metadata! {});

    REQUEST_CONTEXT.run(metadata! { "request_id" => "req-123" }, || {
        client.error("simulated error sent via custom backend", metadata! { "store" => "my-custom-store" });
    });

    client.close().await;
}
