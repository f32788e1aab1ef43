use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use log_collector::init::init_tracing;
use log_collector::noop_sink::NoopSink;
use log_collector::{ClientConfig, LogClient};

#[tokio::main]
async fn main() {
    let sink = NoopSink::default();
    let client = LogClient::with_sink(ClientConfig::default().with_service("default-load"), Arc::new(sink.clone()))
        .expect("log client");
    init_tracing(client.clone()).expect("global subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: emitted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    client.flush_and_wait().await;
    let stats = client.stats();
    println!("shipped {} entries, evicted {}", sink.entries_seen(), stats.evicted);
}
