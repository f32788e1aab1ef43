use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

use log_collector::caller::CallerResolution;
use log_collector::noop_sink::NoopSink;
use log_collector::{metadata, ClientConfig, LogClient};

/// Drives the client directly, without the tracing bridge, with a larger
/// queue and a faster flush than the defaults.
#[tokio::main]
async fn main() {
    let sink = NoopSink::default();

    let config = ClientConfig {
        batch_size: 500,
        flush_interval: Duration::from_millis(200),
        max_queue_size: 50_000,
        caller_resolution: CallerResolution::Disabled,
        ..ClientConfig::default().with_service("custom-load")
    };
    let client = LogClient::with_sink(config, Arc::new(sink.clone())).expect("log client");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        client.error("custom load test error", metadata! { "iteration" => i });
    }

    let elapsed = start.elapsed();
    println!("custom config: emitted {} entries in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    client.close().await;
    let stats = client.stats();
    println!(
        "received {}, shipped {}, evicted {}",
        stats.received,
        sink.entries_seen(),
        stats.evicted
    );
}
