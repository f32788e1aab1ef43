use std::time::Duration;

use log_collector::{metadata, ClientConfig, ErrorDetails, Level, LogClient, REQUEST_CONTEXT, USER_CONTEXT};

/// Ships a handful of entries to the collector named by `LOG_SERVER_URL`
/// (default `http://localhost:8000`).
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ClientConfig {
        close_grace_period: Duration::from_secs(2),
        ..ClientConfig::from_env().with_service("http-collector-demo")
    };
    let client = LogClient::new(config).expect("log client");

    let handler_client = client.clone();
    REQUEST_CONTEXT
        .scope(metadata! { "request_id" => "req-42", "path" => "/checkout" }, async move {
            USER_CONTEXT.run(metadata! { "user_id" => "u-7" }, || {
                handler_client.info("checkout started", metadata! { "items" => 3 });
            });

            let _timer = handler_client.timer("checkout handled", Level::Info, metadata! {});
            tokio::time::sleep(Duration::from_millis(25)).await;

            let details = ErrorDetails::new(
                "TypeError",
                "TypeError: cart is undefined\n    at renderCart (/srv/web/cart.js:12:9)",
            );
            handler_client.error_with_trace("frontend error forwarded", Some(&details), metadata! {});
        })
        .await;

    let total: Result<u32, std::num::ParseIntError> = client.measure(|| "1200".parse::<u32>(), Some("parse amount"), Level::Debug);
    println!("parsed amount: {:?}", total);

    client.close().await;
    println!("stats: {:?}", client.stats());
}
