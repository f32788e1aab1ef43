use crate::client::LogClient;
use crate::layer::LogClientLayer;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Settings for bridging `tracing` events into a [`LogClient`].
///
/// **Fields**
/// - `min_level`: least severe `tracing` level forwarded to the collector.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is added
///   next to [`LogClientLayer`] so events are also printed locally.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    pub min_level: tracing::Level,
    pub enable_stdout: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            min_level: tracing::Level::INFO,
            enable_stdout: true,
        }
    }
}

/// Install a global `tracing` subscriber that forwards events to `client`.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`LogClientLayer`] (and optionally
/// a `fmt` layer) as the process-wide default subscriber, so `tracing`
/// macros anywhere in the process end up at the collector.
///
/// **Errors**
/// - [`SetGlobalDefaultError`] if a global subscriber was already set.
pub fn init_tracing_with_config(client: LogClient, config: TracingConfig) -> Result<(), SetGlobalDefaultError> {
    let layer = LogClientLayer::new(client, config.min_level);

    // The two subscriber shapes have different types, hence two branches.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// [`init_tracing_with_config`] with [`TracingConfig::default`].
pub fn init_tracing(client: LogClient) -> Result<(), SetGlobalDefaultError> {
    init_tracing_with_config(client, TracingConfig::default())
}
