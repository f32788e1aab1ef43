use crate::caller::{resolve_caller_frame, short_type_name};
use crate::record::Metadata;
use serde_json::Value;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt::{self, Write};

/// What [`LogClient::error_with_trace`](crate::client::LogClient::error_with_trace)
/// knows about a failure: a type name and, when available, a textual trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    error_type: String,
    stack_trace: Option<String>,
}

impl ErrorDetails {
    /// Details from an already rendered trace, e.g. one forwarded from a
    /// browser or another service.
    pub fn new(error_type: impl Into<String>, stack_trace: impl Into<String>) -> Self {
        ErrorDetails {
            error_type: error_type.into(),
            stack_trace: Some(stack_trace.into()),
        }
    }

    /// Details without any trace text.
    pub fn without_trace(error_type: impl Into<String>) -> Self {
        ErrorDetails {
            error_type: error_type.into(),
            stack_trace: None,
        }
    }

    /// Describe a Rust error: its type name and its `source()` chain.
    pub fn from_error<E: Error + ?Sized>(error: &E) -> Self {
        let error_type = error_type_name::<E>();
        let mut trace = format!("{error_type}: {error}");
        let mut source = error.source();
        while let Some(cause) = source {
            let _ = write!(trace, "\nCaused by: {cause}");
            source = cause.source();
        }

        ErrorDetails {
            error_type,
            stack_trace: Some(trace),
        }
    }

    /// Describe any displayable failure, such as a boxed `dyn Error` or an
    /// error type that does not implement `std::error::Error`. Only the
    /// top-level message is rendered.
    pub fn from_display<E: fmt::Display + ?Sized>(error: &E) -> Self {
        let error_type = error_type_name::<E>();
        let trace = format!("{error_type}: {error}");
        ErrorDetails {
            error_type,
            stack_trace: Some(trace),
        }
    }

    /// Append a captured backtrace to the trace text, if it holds frames.
    pub fn with_backtrace(mut self, backtrace: &Backtrace) -> Self {
        if backtrace.status() == BacktraceStatus::Captured {
            let trace = self.stack_trace.get_or_insert_with(String::new);
            if !trace.is_empty() {
                trace.push('\n');
            }
            let _ = write!(trace, "stack backtrace:\n{backtrace}");
        }
        self
    }

    pub fn error_type(&self) -> &str {
        &self.error_type
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }
}

/// Short type name, or `Error` for trait objects and wrappers around them.
fn error_type_name<E: ?Sized>() -> String {
    let full = std::any::type_name::<E>();
    if full.contains("dyn ") {
        "Error".to_string()
    } else {
        short_type_name(full).to_string()
    }
}

/// Fields `error_with_trace` derives before explicit metadata is applied.
///
/// With details: `error_type`, `stack_trace`, and `function_name` /
/// `file_path` from the first parseable frame. Without: the current
/// thread's backtrace as `stack_trace`.
pub(crate) fn trace_fields(error: Option<&ErrorDetails>) -> Metadata {
    let mut fields = Metadata::new();
    match error {
        Some(details) => {
            fields.insert("error_type".into(), Value::from(details.error_type.clone()));
            if let Some(trace) = &details.stack_trace {
                fields.insert("stack_trace".into(), Value::from(trace.clone()));
                if let Some(frame) = resolve_caller_frame(trace) {
                    if let Some(function_name) = frame.function_name {
                        fields.insert("function_name".into(), Value::from(function_name));
                    }
                    if let Some(file_path) = frame.file_path {
                        fields.insert("file_path".into(), Value::from(file_path));
                    }
                }
            }
        }
        None => {
            let trace = Backtrace::force_capture().to_string();
            fields.insert("stack_trace".into(), Value::from(trace));
        }
    }
    fields
}
