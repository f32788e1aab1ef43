mod common;

use common::{test_config, RecordingSink, StalledSink};
use log_collector::{metadata, ClientConfig, LogClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn messages(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("e{i}")).collect()
}

#[tokio::test(start_paused = true)]
async fn size_trigger_sends_exactly_one_full_batch() {
    let sink = RecordingSink::new();
    let client = LogClient::with_sink(test_config(10, Duration::from_secs(1)), sink.clone()).unwrap();

    for i in 0..9 {
        client.info(format!("e{i}"), metadata! {});
    }
    sleep(Duration::from_millis(10)).await;
    assert!(sink.attempts().is_empty());

    client.info("e9", metadata! {});
    sleep(Duration::from_millis(10)).await;

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 10);
    assert_eq!(sink.messages(), messages(0..10));
}

#[tokio::test(start_paused = true)]
async fn interval_trigger_sends_partial_batch_once() {
    let sink = RecordingSink::new();
    let client = LogClient::with_sink(test_config(10, Duration::from_millis(100)), sink.clone()).unwrap();

    for i in 0..3 {
        client.info(format!("e{i}"), metadata! {});
    }
    sleep(Duration::from_millis(150)).await;
    assert_eq!(sink.batches().len(), 1);
    assert_eq!(sink.messages(), messages(0..3));

    sleep(Duration::from_millis(500)).await;
    assert_eq!(sink.attempts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_batch_is_retried_until_delivered() {
    let sink = RecordingSink::new();
    sink.set_failing(true);
    let client = LogClient::with_sink(test_config(10, Duration::from_millis(100)), sink.clone()).unwrap();

    for i in 0..3 {
        client.info(format!("e{i}"), metadata! {});
    }
    sleep(Duration::from_millis(250)).await;
    assert!(sink.batches().is_empty());
    let failed = sink.attempts();
    assert!(failed.len() >= 2);
    assert_eq!(client.stats().failed_sends, failed.len() as u64);

    sink.set_failing(false);
    sleep(Duration::from_millis(100)).await;

    let delivered = sink.batches();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0], failed[0]);
    assert_eq!(client.stats().delivered, 3);
}

#[tokio::test(start_paused = true)]
async fn failed_full_batch_is_retried_by_the_interval() {
    let sink = RecordingSink::new();
    sink.set_failing(true);
    let client = LogClient::with_sink(test_config(3, Duration::from_millis(100)), sink.clone()).unwrap();

    for i in 0..3 {
        client.info(format!("e{i}"), metadata! {});
    }
    sleep(Duration::from_millis(10)).await;
    assert_eq!(sink.attempts().len(), 1);

    sink.set_failing(false);
    sleep(Duration::from_millis(150)).await;

    assert_eq!(sink.attempts().len(), 2);
    assert_eq!(sink.messages(), messages(0..3));
    assert_eq!(sink.batches()[0], sink.attempts()[0]);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(sink.attempts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn requeued_batch_goes_ahead_of_newer_entries() {
    let sink = RecordingSink::new();
    sink.set_failing(true);
    let client = LogClient::with_sink(test_config(10, Duration::from_millis(100)), sink.clone()).unwrap();

    client.info("a", metadata! {});
    client.info("b", metadata! {});
    sleep(Duration::from_millis(150)).await;
    assert_eq!(sink.attempts().len(), 1);

    client.info("c", metadata! {});
    sink.set_failing(false);
    sleep(Duration::from_millis(100)).await;

    assert_eq!(sink.messages(), vec!["a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn overflow_keeps_most_recent_entries() {
    let sink = RecordingSink::new();
    let config = ClientConfig {
        max_queue_size: 5,
        ..test_config(100, Duration::from_secs(60))
    };
    let client = LogClient::with_sink(config, sink.clone()).unwrap();

    for i in 0..12 {
        client.info(format!("e{i}"), metadata! {});
    }
    client.flush_and_wait().await;

    assert_eq!(sink.messages(), messages(7..12));
    let stats = client.stats();
    assert_eq!(stats.received, 12);
    assert_eq!(stats.evicted, 7);
}

#[tokio::test(start_paused = true)]
async fn sustained_outage_evicts_retried_entries_first() {
    let sink = RecordingSink::new();
    sink.set_failing(true);
    let config = ClientConfig {
        max_queue_size: 5,
        ..test_config(100, Duration::from_millis(100))
    };
    let client = LogClient::with_sink(config, sink.clone()).unwrap();

    for i in 0..5 {
        client.info(format!("e{i}"), metadata! {});
    }
    sleep(Duration::from_millis(150)).await;
    assert_eq!(sink.attempts().len(), 1);

    for i in 5..8 {
        client.info(format!("e{i}"), metadata! {});
    }
    sink.set_failing(false);
    sleep(Duration::from_millis(100)).await;

    assert_eq!(sink.messages(), messages(3..8));
    assert_eq!(client.stats().evicted, 3);
}

#[tokio::test(start_paused = true)]
async fn explicit_flush_drains_a_single_entry() {
    let sink = RecordingSink::new();
    let client = LogClient::with_sink(test_config(1000, Duration::from_secs(60)), sink.clone()).unwrap();

    client.flush_and_wait().await;
    assert!(sink.attempts().is_empty());

    client.info("lonely", metadata! {});
    client.flush();
    sleep(Duration::from_millis(1)).await;
    assert_eq!(sink.messages(), vec!["lonely"]);

    client.flush();
    client.flush_and_wait().await;
    assert_eq!(sink.attempts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn explicit_flush_sends_in_batch_sized_chunks() {
    let sink = RecordingSink::new();
    let client = LogClient::with_sink(test_config(4, Duration::from_secs(60)), sink.clone()).unwrap();

    client.flush();
    for i in 0..3 {
        client.info(format!("e{i}"), metadata! {});
    }
    sleep(Duration::from_millis(1)).await;
    assert!(sink.attempts().is_empty());

    // 3 queued + 6 more: one size-triggered batch on the way, rest on flush.
    for i in 3..9 {
        client.info(format!("e{i}"), metadata! {});
    }
    client.flush_and_wait().await;

    let sizes: Vec<usize> = sink.batches().iter().map(Vec::len).collect();
    assert!(sizes.iter().all(|&n| n <= 4));
    assert_eq!(sink.messages(), messages(0..9));
}

#[tokio::test(start_paused = true)]
async fn close_flushes_then_drops_later_entries() {
    let sink = RecordingSink::new();
    let client = LogClient::with_sink(test_config(1000, Duration::from_secs(60)), sink.clone()).unwrap();

    client.info("before close", metadata! {});
    client.warn("also before close", metadata! {});
    client.close().await;

    assert!(client.is_closed());
    assert_eq!(sink.messages(), vec!["before close", "also before close"]);

    client.error("after close", metadata! {});
    client.flush();
    client.flush_and_wait().await;
    client.close().await;
    sleep(Duration::from_secs(120)).await;

    assert_eq!(sink.messages(), vec!["before close", "also before close"]);
    assert_eq!(client.stats().received, 2);
}

#[tokio::test(start_paused = true)]
async fn close_gives_up_after_grace_period() {
    let config = ClientConfig {
        close_grace_period: Duration::from_millis(100),
        ..test_config(1000, Duration::from_secs(60))
    };
    let client = LogClient::with_sink(config, Arc::new(StalledSink)).unwrap();

    client.info("stuck", metadata! {});
    let started = tokio::time::Instant::now();
    client.close().await;

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(client.is_closed());
    client.info("ignored", metadata! {});
}

#[tokio::test(start_paused = true)]
async fn dropping_last_handle_drains_queue() {
    let sink = RecordingSink::new();
    let client = LogClient::with_sink(test_config(1000, Duration::from_secs(60)), sink.clone()).unwrap();
    let clone = client.clone();

    client.info("one", metadata! {});
    clone.info("two", metadata! {});
    drop(client);
    drop(clone);
    sleep(Duration::from_millis(10)).await;

    assert_eq!(sink.messages(), vec!["one", "two"]);
}

#[test]
fn constructing_outside_a_runtime_fails() {
    let result = LogClient::with_sink(ClientConfig::default(), RecordingSink::new());
    assert!(matches!(result, Err(log_collector::error::ClientError::NoRuntime(_))));
}

#[test]
fn close_before_runtime_shutdown_delivers_queued_entries() {
    let sink = RecordingSink::new();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let client = LogClient::with_sink(test_config(1000, Duration::from_secs(60)), sink.clone()).unwrap();
        client.info("last words", metadata! {});
        client.warn("really last", metadata! {});
        client.close().await;
    });
    drop(runtime);

    assert_eq!(sink.messages(), vec!["last words", "really last"]);
}
