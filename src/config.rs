use crate::caller::CallerResolution;
use crate::env::{
    env_flag, env_opt, env_or, ENABLE_GLOBAL_ERROR_HANDLER_ENV, ENVIRONMENT_ENV, LOG_SERVER_URL_ENV, LOG_TYPE_ENV,
    SERVICE_NAME_ENV, SERVICE_VERSION_ENV,
};
#[cfg(feature = "http")]
use crate::http::{HttpSinkConfig, DEFAULT_COMPRESSION_THRESHOLD};
use crate::shipper::ShipperConfig;
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_SERVICE_VERSION: &str = "v0.0.0-dev";
pub const DEFAULT_LOG_TYPE: &str = "BACKEND";

/// Client configuration.
///
/// Controls the defaults stamped on each entry, the size and time triggers
/// of the shipper, queue capacity, compression and the shutdown grace period.
///
/// **Fields**
/// - `server_url`: collector base URL; entries are POSTed to `{server_url}/logs`.
/// - `service` / `environment` / `service_version` / `log_type`: lowest
///   precedence defaults merged into every entry.
/// - `batch_size`: queue length that triggers an immediate send.
/// - `flush_interval`: period of the partial-batch flush.
/// - `max_queue_size`: capacity before oldest-first eviction.
/// - `enable_compression` / `compression_threshold`: gzip batches of at
///   least this many entries.
/// - `enable_global_error_handler`: install the process-wide panic hook.
/// - `caller_resolution`: how `function_name` / `file_path` are inferred.
/// - `close_grace_period`: how long `close()` waits for the final flush.
/// - `request_timeout`: upper bound for one POST.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub server_url: String,
    pub service: Option<String>,
    pub environment: Option<String>,
    pub service_version: Option<String>,
    pub log_type: Option<String>,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_queue_size: usize,
    pub enable_compression: bool,
    pub compression_threshold: usize,
    pub enable_global_error_handler: bool,
    pub caller_resolution: CallerResolution,
    pub close_grace_period: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            service: None,
            environment: Some(DEFAULT_ENVIRONMENT.to_string()),
            service_version: Some(DEFAULT_SERVICE_VERSION.to_string()),
            log_type: Some(DEFAULT_LOG_TYPE.to_string()),
            batch_size: 1000,
            flush_interval: Duration::from_secs(1),
            max_queue_size: 10_000,
            enable_compression: true,
            compression_threshold: 100,
            enable_global_error_handler: false,
            caller_resolution: CallerResolution::Location,
            close_grace_period: Duration::from_millis(100),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with the variables listed in [`crate::env`].
    ///
    /// Fields set on the returned value afterwards take precedence over the
    /// environment, which in turn takes precedence over the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_url: trim_url(&env_or(LOG_SERVER_URL_ENV, DEFAULT_SERVER_URL)),
            service: env_opt(SERVICE_NAME_ENV),
            environment: env_opt(ENVIRONMENT_ENV).or(defaults.environment.clone()),
            service_version: env_opt(SERVICE_VERSION_ENV).or(defaults.service_version.clone()),
            log_type: env_opt(LOG_TYPE_ENV).or(defaults.log_type.clone()),
            enable_global_error_handler: env_flag(ENABLE_GLOBAL_ERROR_HANDLER_ENV),
            ..defaults
        }
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = trim_url(&url.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub(crate) fn shipper_config(&self) -> ShipperConfig {
        ShipperConfig {
            batch_size: self.batch_size.max(1),
            flush_interval: self.flush_interval.max(Duration::from_millis(10)),
            max_queue_size: self.max_queue_size.max(1),
        }
    }

    #[cfg(feature = "http")]
    pub(crate) fn http_sink_config(&self) -> HttpSinkConfig {
        HttpSinkConfig {
            server_url: trim_url(&self.server_url),
            enable_compression: self.enable_compression,
            compression_threshold: if self.compression_threshold == 0 {
                DEFAULT_COMPRESSION_THRESHOLD
            } else {
                self.compression_threshold
            },
            timeout: self.request_timeout,
        }
    }
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
