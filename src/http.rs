use crate::record::LogEntry;
use crate::sink::LogSink;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::error::Error;
use std::io::Write;
use std::time::Duration;

/// Batches at least this long are gzipped when compression is enabled.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 100;

/// Configuration for [`HttpSink`].
///
/// The sink talks to the collector's `POST {server_url}/logs` endpoint with
/// a `{"logs": [...]}` JSON body.
#[derive(Clone, Debug)]
pub struct HttpSinkConfig {
    /// Base URL without path, e.g. "http://127.0.0.1:8000"
    pub server_url: String,
    pub enable_compression: bool,
    pub compression_threshold: usize,
    /// Upper bound for a single POST, connect included.
    pub timeout: Duration,
}

impl HttpSinkConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        HttpSinkConfig {
            server_url: server_url.into(),
            enable_compression: true,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Non-2xx answer from the collector.
#[derive(thiserror::Error, Debug)]
#[error("collector rejected log batch with status {status}: {body}")]
pub struct HttpSinkError {
    pub status: StatusCode,
    pub body: String,
}

/// Collector implementation of [`LogSink`] over HTTP.
#[derive(Clone)]
pub struct HttpSink {
    client: Client,
    config: HttpSinkConfig,
}

#[derive(Serialize)]
struct Payload<'a> {
    logs: &'a [LogEntry],
}

/// Request body ready to POST, plus whether it was gzipped.
#[derive(Debug)]
pub(crate) struct EncodedBatch {
    pub body: Vec<u8>,
    pub gzipped: bool,
}

impl HttpSink {
    /// Construct a new sink from the provided configuration.
    ///
    /// **Returns**
    /// - `Err(..)` if the underlying HTTP client (TLS backend) cannot be
    ///   built. This surfaces as a constructor failure of the client.
    pub fn new(config: HttpSinkConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpSinkConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/logs", self.config.server_url.trim_end_matches('/'))
    }

    pub(crate) fn encode(&self, batch: &[LogEntry]) -> Result<EncodedBatch, Box<dyn Error + Send + Sync>> {
        let json = serde_json::to_vec(&Payload { logs: batch })?;

        if self.config.enable_compression && batch.len() >= self.config.compression_threshold {
            let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 4), Compression::default());
            encoder.write_all(&json)?;
            return Ok(EncodedBatch { body: encoder.finish()?, gzipped: true });
        }

        Ok(EncodedBatch { body: json, gzipped: false })
    }
}

#[async_trait]
impl LogSink for HttpSink {
    async fn send_batch(&self, batch: &[LogEntry]) -> Result<(), Box<dyn Error + Send + Sync>> {
        let encoded = self.encode(batch)?;

        let mut request = self
            .client
            .post(self.endpoint())
            .header(CONTENT_TYPE, "application/json");
        if encoded.gzipped {
            request = request.header(CONTENT_ENCODING, "gzip");
        }

        let resp = request.body(encoded.body).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(Box::new(HttpSinkError { status, body }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Level, Metadata};
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn batch(n: usize) -> Vec<LogEntry> {
        (0..n)
            .map(|i| LogEntry::new(Level::Info, format!("entry {i}"), Metadata::new()))
            .collect()
    }

    #[test]
    fn small_batches_stay_plain_json() {
        let sink = HttpSink::new(HttpSinkConfig::new("http://localhost:8000")).unwrap();
        let encoded = sink.encode(&batch(99)).unwrap();
        assert!(!encoded.gzipped);

        let value: serde_json::Value = serde_json::from_slice(&encoded.body).unwrap();
        assert_eq!(value["logs"].as_array().unwrap().len(), 99);
        assert_eq!(value["logs"][0]["message"], "entry 0");
    }

    #[test]
    fn batches_at_threshold_are_gzipped() {
        let sink = HttpSink::new(HttpSinkConfig::new("http://localhost:8000")).unwrap();
        let encoded = sink.encode(&batch(100)).unwrap();
        assert!(encoded.gzipped);

        let mut json = String::new();
        GzDecoder::new(encoded.body.as_slice()).read_to_string(&mut json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["logs"].as_array().unwrap().len(), 100);
    }

    #[test]
    fn compression_can_be_disabled() {
        let mut config = HttpSinkConfig::new("http://localhost:8000");
        config.enable_compression = false;
        let sink = HttpSink::new(config).unwrap();
        assert!(!sink.encode(&batch(500)).unwrap().gzipped);
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let sink = HttpSink::new(HttpSinkConfig::new("http://collector:8000/")).unwrap();
        assert_eq!(sink.endpoint(), "http://collector:8000/logs");
    }
}
