use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Open key/value map carried by every [`LogEntry`] and by context frames.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Keys owned by [`LogEntry`] itself; they are never taken from metadata.
pub const RESERVED_KEYS: [&str; 3] = ["level", "message", "created_at"];

/// Severity of a [`LogEntry`], serialized in upper case (`"INFO"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Error returned when a string does not name a [`Level`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "FATAL" | "CRITICAL" => Ok(Level::Fatal),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// One structured record queued for shipment.
///
/// Metadata is flattened next to `level`, `message` and `created_at` when
/// serialized, which is the shape the collector's `POST /logs` expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
    /// Unix timestamp in seconds with sub-second precision.
    pub created_at: f64,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl LogEntry {
    /// Build an entry stamped with the current time.
    ///
    /// Reserved keys (`level`, `message`, `created_at`) are removed from
    /// `metadata` so the flattened output never carries duplicates.
    pub fn new(level: Level, message: impl Into<String>, mut metadata: Metadata) -> Self {
        for key in RESERVED_KEYS {
            metadata.remove(key);
        }
        LogEntry {
            level,
            message: message.into(),
            created_at: now_seconds(),
            metadata,
        }
    }

    /// Shorthand for reading a metadata value as a string.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Current wall-clock time as fractional Unix seconds.
pub fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Insert `value` under `key` unless a non-null value is already present.
///
/// This is how lower-precedence sources (caller inference, context frames,
/// client defaults) fill in an entry without overriding explicit fields.
pub(crate) fn fill_absent(metadata: &mut Metadata, key: &str, value: serde_json::Value) {
    match metadata.get(key) {
        Some(existing) if !existing.is_null() => {}
        _ => {
            metadata.insert(key.to_string(), value);
        }
    }
}

/// Build a [`Metadata`] map from `key => value` pairs.
///
/// Values go through `serde_json::json!`, so anything it accepts works.
///
/// ```
/// use log_collector::metadata;
///
/// let meta = metadata! { "user_id" => 42, "plan" => "pro" };
/// assert_eq!(meta["user_id"], 42);
/// ```
#[macro_export]
macro_rules! metadata {
    () => {
        $crate::record::Metadata::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::record::Metadata::new();
        $(
            map.insert(::std::string::String::from($key), $crate::serde_json::json!($value));
        )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_flat_with_uppercase_level() {
        let mut entry = LogEntry::new(Level::Warn, "disk almost full", metadata! { "service" => "api", "free_mb" => 12 });
        entry.created_at = 1_700_000_000.5;

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({
                "level": "WARN",
                "message": "disk almost full",
                "created_at": 1_700_000_000.5,
                "service": "api",
                "free_mb": 12,
            })
        );
    }

    #[test]
    fn reserved_keys_are_stripped_from_metadata() {
        let entry = LogEntry::new(Level::Info, "real", metadata! { "message" => "fake", "level" => "DEBUG", "k" => 1 });
        assert_eq!(entry.message, "real");
        assert_eq!(entry.level, Level::Info);
        assert!(!entry.metadata.contains_key("message"));
        assert!(!entry.metadata.contains_key("level"));
        assert_eq!(entry.metadata["k"], 1);
    }

    #[test]
    fn fill_absent_treats_null_as_missing() {
        let mut meta = metadata! { "a" => serde_json::Value::Null, "b" => "kept" };
        fill_absent(&mut meta, "a", json!("filled"));
        fill_absent(&mut meta, "b", json!("ignored"));
        fill_absent(&mut meta, "c", json!(3));
        assert_eq!(meta["a"], "filled");
        assert_eq!(meta["b"], "kept");
        assert_eq!(meta["c"], 3);
    }

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!("warn".parse::<Level>(), Ok(Level::Warn));
        assert_eq!("Fatal".parse::<Level>(), Ok(Level::Fatal));
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn created_at_is_recent() {
        let entry = LogEntry::new(Level::Info, "now", Metadata::new());
        let now = Utc::now().timestamp() as f64;
        assert!((entry.created_at - now).abs() < 5.0);
    }
}
