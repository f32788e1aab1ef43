use crate::client::{LogClient, AUTO_CALLER_KEY};
use crate::record::{Level, Metadata};
use serde_json::Value;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Events from these targets are this crate's own diagnostics and are never
/// forwarded, otherwise a failing collector would feed its own queue.
const OWN_TARGET: &str = "log_collector";

/// `tracing_subscriber` layer that turns `tracing` events into log entries
/// shipped by a [`LogClient`].
///
/// Events below `min_level` are ignored. Fields become metadata, the
/// `message` field becomes the entry message, and the event's source file is
/// used as `file_path`. Context propagation and client defaults apply as for
/// any other emission.
pub struct LogClientLayer {
    client: LogClient,
    min_level: tracing::Level,
    /// Events forwarded to the client.
    pub forwarded_events: Arc<AtomicU64>,
}

impl LogClientLayer {
    pub fn new(client: LogClient, min_level: tracing::Level) -> Self {
        Self {
            client,
            min_level,
            forwarded_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for LogClientLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.min_level || is_own_target(meta.target()) {
            return;
        }

        let mut fields = Metadata::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        fields.insert(AUTO_CALLER_KEY.into(), Value::Bool(false));
        fields.entry("target".into()).or_insert_with(|| Value::from(meta.target()));
        if let Some(file) = meta.file() {
            fields.entry("file_path".into()).or_insert_with(|| Value::from(file));
        }
        if let Some(module_path) = meta.module_path() {
            fields.entry("function_name".into()).or_insert_with(|| Value::from(module_path));
        }

        self.forwarded_events.fetch_add(1, Ordering::Relaxed);
        self.client.emit(
            Level::from(*meta.level()),
            message.unwrap_or_default(),
            fields,
            Location::caller(),
        );
    }
}

fn is_own_target(target: &str) -> bool {
    target == OWN_TARGET || target.starts_with("log_collector::")
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Metadata,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), Value::String(format!("{:?}", value)));
        }
    }
}
