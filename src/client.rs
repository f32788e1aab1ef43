use crate::caller::{callable_name, CallerResolver};
use crate::config::ClientConfig;
use crate::context::{REQUEST_CONTEXT, USER_CONTEXT};
use crate::error::ClientError;
use crate::hook;
use crate::record::{fill_absent, Level, LogEntry, Metadata};
use crate::shipper::{Shipper, StatsSnapshot};
use crate::sink::LogSink;
use crate::trace::{trace_fields, ErrorDetails};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Metadata flag that turns caller inference off for one call when `false`.
pub const AUTO_CALLER_KEY: &str = "auto_caller";

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Entry point for emitting structured logs to the collector.
///
/// Every emission builds a [`LogEntry`] on the calling thread and hands it to
/// a background shipper task through a channel; no method here waits on the
/// network. Cloning is cheap and all clones share one shipper.
///
/// Await [`close`](Self::close) before the runtime shuts down, e.g. at the
/// end of a `#[tokio::main]` function. Dropping the last handle only asks the
/// shipper to drain; a runtime that is shutting down cancels that task and
/// whatever is still queued is lost.
///
/// ```no_run
/// # async fn demo() -> Result<(), log_collector::error::ClientError> {
/// use log_collector::{metadata, ClientConfig, LogClient};
///
/// let client = LogClient::new(ClientConfig::from_env().with_service("payment-api"))?;
/// client.info("payment accepted", metadata! { "amount" => 1200 });
/// client.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LogClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    id: u64,
    service: Option<String>,
    environment: Option<String>,
    service_version: Option<String>,
    log_type: Option<String>,
    resolver: CallerResolver,
    shipper: Shipper,
    close_grace_period: Duration,
    closed: AtomicBool,
}

impl fmt::Debug for LogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogClient")
            .field("id", &self.inner.id)
            .field("service", &self.inner.service)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl LogClient {
    /// Create a client that ships to the HTTP collector at
    /// `config.server_url`.
    ///
    /// Must be called from within a tokio runtime.
    #[cfg(feature = "http")]
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let sink = crate::http::HttpSink::new(config.http_sink_config())?;
        Self::with_sink(config, Arc::new(sink))
    }

    /// [`LogClient::new`] with [`ClientConfig::from_env`].
    #[cfg(feature = "http")]
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env())
    }

    /// Create a client that ships to an arbitrary [`LogSink`].
    ///
    /// **Errors**
    /// - [`ClientError::NoRuntime`] outside a tokio runtime.
    /// - [`ClientError::Hook`] if `enable_global_error_handler` is set while
    ///   another client owns the panic hook.
    pub fn with_sink(config: ClientConfig, sink: Arc<dyn LogSink>) -> Result<Self, ClientError> {
        let shipper = Shipper::spawn(sink, config.shipper_config())?;

        let client = LogClient {
            inner: Arc::new(ClientInner {
                id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
                service: config.service.clone(),
                environment: config.environment.clone(),
                service_version: config.service_version.clone(),
                log_type: config.log_type.clone(),
                resolver: CallerResolver::new(config.caller_resolution),
                shipper,
                close_grace_period: config.close_grace_period,
                closed: AtomicBool::new(false),
            }),
        };

        if config.enable_global_error_handler {
            if let Err(e) = hook::install(&client) {
                client.inner.shipper.terminate();
                return Err(e.into());
            }
        }

        Ok(client)
    }

    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    /// Emit one entry. Returns immediately; delivery happens in the
    /// background.
    ///
    /// Field precedence, highest first: explicit `metadata`, inferred caller
    /// (`function_name` / `file_path`), user context over request context,
    /// client defaults. Pass `"auto_caller" => false` to skip caller
    /// inference for this call.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>, metadata: Metadata) {
        self.emit(level, message.into(), metadata, Location::caller());
    }

    #[track_caller]
    pub fn trace(&self, message: impl Into<String>, metadata: Metadata) {
        self.emit(Level::Trace, message.into(), metadata, Location::caller());
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>, metadata: Metadata) {
        self.emit(Level::Debug, message.into(), metadata, Location::caller());
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>, metadata: Metadata) {
        self.emit(Level::Info, message.into(), metadata, Location::caller());
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<String>, metadata: Metadata) {
        self.emit(Level::Warn, message.into(), metadata, Location::caller());
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>, metadata: Metadata) {
        self.emit(Level::Error, message.into(), metadata, Location::caller());
    }

    #[track_caller]
    pub fn fatal(&self, message: impl Into<String>, metadata: Metadata) {
        self.emit(Level::Fatal, message.into(), metadata, Location::caller());
    }

    pub fn start_timer(&self) -> Instant {
        Instant::now()
    }

    /// Log with `duration_ms` set to the time elapsed since `start`.
    #[track_caller]
    pub fn end_timer(&self, start: Instant, level: Level, message: impl Into<String>, mut metadata: Metadata) {
        metadata.insert("duration_ms".into(), Value::from(elapsed_ms(start)));
        self.emit(level, message.into(), metadata, Location::caller());
    }

    /// Guard that logs `message` with `duration_ms` when dropped.
    #[track_caller]
    pub fn timer(&self, message: impl Into<String>, level: Level, metadata: Metadata) -> TimerGuard<'_> {
        TimerGuard {
            client: self,
            start: Instant::now(),
            level,
            message: message.into(),
            metadata: Some(metadata),
            location: Location::caller(),
        }
    }

    /// Time a fallible closure.
    ///
    /// `Ok` logs `"<name> completed"` (or `message`) at `level` with
    /// `duration_ms` and `function_name`. `Err` logs the error-with-trace
    /// variant with the same fields and is then returned unchanged. Any
    /// displayable error works, boxed `dyn Error` included; the logged
    /// `stack_trace` is its type name and message.
    #[track_caller]
    pub fn measure<T, E, F>(&self, f: F, message: Option<&str>, level: Level) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: fmt::Display,
    {
        let location = Location::caller();
        let name = callable_name::<F>();
        let start = Instant::now();
        let result = f();
        self.record_measurement(&result, start, name, message, level, location);
        result
    }

    /// Async counterpart of [`measure`](Self::measure). Timing starts at the
    /// first poll.
    #[track_caller]
    pub fn measure_async<'a, T, E, Fut>(
        &'a self,
        future: Fut,
        message: Option<&'a str>,
        level: Level,
    ) -> impl Future<Output = Result<T, E>> + 'a
    where
        Fut: Future<Output = Result<T, E>> + 'a,
        E: fmt::Display + 'a,
        T: 'a,
    {
        let location = Location::caller();
        let name = callable_name::<Fut>();
        async move {
            let start = Instant::now();
            let result = future.await;
            self.record_measurement(&result, start, name, message, level, location);
            result
        }
    }

    /// Emit an ERROR entry enriched from `error`.
    ///
    /// With details: `error_type`, `stack_trace`, and `function_name` /
    /// `file_path` from the first parseable frame of the trace. Without:
    /// the current backtrace as `stack_trace`. Explicit `metadata` overrides
    /// every derived field.
    #[track_caller]
    pub fn error_with_trace(&self, message: impl Into<String>, error: Option<&ErrorDetails>, metadata: Metadata) {
        self.emit_error_with_trace(message.into(), error, metadata, Location::caller());
    }

    /// Ask the shipper to drain whatever is queued, even a single entry.
    pub fn flush(&self) {
        self.inner.shipper.request_flush();
    }

    /// Like [`flush`](Self::flush) but resolves once the drain attempt ran.
    /// Returns immediately on a closed client.
    pub async fn flush_and_wait(&self) {
        let _ = self.inner.shipper.flush_with_ack().await;
    }

    /// Flush, wait at most the configured grace period, then stop the
    /// shipper.
    ///
    /// Later log calls are accepted and silently dropped. Removes the panic
    /// hook if this client installed it. Calling it again does nothing.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        hook::uninstall(self.inner.id);

        let ack = self.inner.shipper.flush_with_ack();
        if tokio::time::timeout(self.inner.close_grace_period, ack).await.is_err() {
            debug!("grace period elapsed before the final log flush finished");
        }
        self.inner.shipper.terminate();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst) || self.inner.shipper.is_terminated()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.shipper.stats()
    }

    pub(crate) fn emit_error_with_trace(
        &self,
        message: String,
        error: Option<&ErrorDetails>,
        metadata: Metadata,
        location: &'static Location<'static>,
    ) {
        let mut fields = trace_fields(error);
        fields.extend(metadata);
        self.emit(Level::Error, message, fields, location);
    }

    pub(crate) fn emit(&self, level: Level, message: String, mut metadata: Metadata, location: &'static Location<'static>) {
        if self.inner.shipper.is_terminated() {
            return;
        }

        let auto_caller = !matches!(metadata.remove(AUTO_CALLER_KEY), Some(Value::Bool(false)));
        let has_function = metadata.get("function_name").is_some_and(|v| !v.is_null());
        if auto_caller && !has_function {
            if let Some(frame) = self.inner.resolver.resolve(location) {
                if let Some(function_name) = frame.function_name {
                    fill_absent(&mut metadata, "function_name", Value::from(function_name));
                }
                if let Some(file_path) = frame.file_path {
                    fill_absent(&mut metadata, "file_path", Value::from(file_path));
                }
            }
        }

        if let Some(context) = effective_context() {
            for (key, value) in context {
                fill_absent(&mut metadata, &key, value);
            }
        }

        let inner = &self.inner;
        for (key, default) in [
            ("service", &inner.service),
            ("environment", &inner.environment),
            ("service_version", &inner.service_version),
            ("log_type", &inner.log_type),
        ] {
            if let Some(default) = default {
                fill_absent(&mut metadata, key, Value::from(default.as_str()));
            }
        }

        inner.shipper.enqueue(LogEntry::new(level, message, metadata));
    }

    fn record_measurement<T, E: fmt::Display>(
        &self,
        result: &Result<T, E>,
        start: Instant,
        name: String,
        message: Option<&str>,
        level: Level,
        location: &'static Location<'static>,
    ) {
        let mut metadata = Metadata::new();
        metadata.insert("duration_ms".into(), Value::from(elapsed_ms(start)));
        metadata.insert("function_name".into(), Value::from(name.clone()));

        match result {
            Ok(_) => {
                let message = message.map_or_else(|| format!("{name} completed"), str::to_string);
                self.emit(level, message, metadata, location);
            }
            Err(e) => {
                let message = message.map_or_else(|| format!("{name} failed"), str::to_string);
                self.emit_error_with_trace(message, Some(&ErrorDetails::from_display(e)), metadata, location);
            }
        }
    }
}

/// Request context with user context layered on top, or `None` if both are
/// unset.
fn effective_context() -> Option<Metadata> {
    match (REQUEST_CONTEXT.get(), USER_CONTEXT.get()) {
        (None, None) => None,
        (request, user) => {
            let mut merged = request.unwrap_or_default();
            merged.extend(user.unwrap_or_default());
            Some(merged)
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Returned by [`LogClient::timer`]; logs on drop.
#[must_use = "the duration is logged when the guard is dropped"]
pub struct TimerGuard<'a> {
    client: &'a LogClient,
    start: Instant,
    level: Level,
    message: String,
    metadata: Option<Metadata>,
    location: &'static Location<'static>,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        let mut metadata = self.metadata.take().unwrap_or_default();
        metadata.insert("duration_ms".into(), Value::from(elapsed_ms(self.start)));
        self.client
            .emit(self.level, std::mem::take(&mut self.message), metadata, self.location);
    }
}
