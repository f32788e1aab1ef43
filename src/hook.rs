//! Process-wide panic hook that reports panics through a [`LogClient`].
//!
//! A single registration slot is kept for the whole process. Installing
//! snapshots the hook that was active before and chains to it on every
//! panic; uninstalling puts that hook back.

use crate::caller::resolve_external_frame;
use crate::client::{LogClient, AUTO_CALLER_KEY};
use crate::error::HookError;
use crate::record::Metadata;
use crate::trace::ErrorDetails;
use serde_json::Value;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, Location, PanicHookInfo};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

struct Registration {
    owner: u64,
    previous: Arc<PanicHook>,
}

static REGISTRATION: Mutex<Option<Registration>> = Mutex::new(None);

/// Where a reported panic happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicKind {
    /// Outside any tokio task; the panic unwinds the thread.
    Uncaught,
    /// Inside a tokio task; the runtime catches it and only a joined handle
    /// would ever observe it.
    Task,
}

impl PanicKind {
    fn current() -> Self {
        if tokio::task::try_id().is_some() {
            PanicKind::Task
        } else {
            PanicKind::Uncaught
        }
    }

    /// Value written to `error_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PanicKind::Uncaught => "UncaughtPanic",
            PanicKind::Task => "TaskPanic",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            PanicKind::Uncaught => "Uncaught panic",
            PanicKind::Task => "Unobserved panic in async task",
        }
    }
}

/// Install the panic hook for `client`.
///
/// Fails with [`HookError::AlreadyInstalled`] while any client holds the
/// slot; nested registrations are not supported.
pub(crate) fn install(client: &LogClient) -> Result<(), HookError> {
    let mut slot = REGISTRATION.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(HookError::AlreadyInstalled);
    }

    let owner = client.id();
    let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
    let chained = Arc::clone(&previous);
    let client = client.clone();
    panic::set_hook(Box::new(move |info| {
        report_panic(&client, info);
        (**chained)(info);
    }));

    *slot = Some(Registration { owner, previous });
    debug!(owner, "global panic hook installed");
    Ok(())
}

/// Remove the hook if `owner` installed it and restore the previous one.
/// Returns whether anything was removed.
pub(crate) fn uninstall(owner: u64) -> bool {
    let mut slot = REGISTRATION.lock().unwrap_or_else(PoisonError::into_inner);
    if !slot.as_ref().is_some_and(|reg| reg.owner == owner) {
        return false;
    }
    let Some(registration) = slot.take() else {
        return false;
    };

    // Dropping our hook releases its clone of `previous`.
    drop(panic::take_hook());
    match Arc::try_unwrap(registration.previous) {
        Ok(previous) => panic::set_hook(previous),
        Err(shared) => panic::set_hook(Box::new(move |info| (**shared)(info))),
    }
    debug!(owner, "global panic hook removed");
    true
}

/// Whether any client currently owns the panic hook.
pub fn is_installed() -> bool {
    REGISTRATION
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

fn report_panic(client: &LogClient, info: &PanicHookInfo<'_>) {
    let kind = PanicKind::current();
    let backtrace = Backtrace::force_capture();
    let rendered = backtrace.to_string();

    let mut metadata = Metadata::new();
    metadata.insert(AUTO_CALLER_KEY.into(), Value::Bool(false));
    metadata.insert("error_type".into(), Value::from(kind.as_str()));
    metadata.insert("reason".into(), Value::from(payload_message(info.payload())));
    metadata.insert("stack_trace".into(), Value::from(rendered.as_str()));
    if let Some(location) = info.location() {
        metadata.insert("file_path".into(), Value::from(location.file()));
        metadata.insert("line".into(), Value::from(location.line()));
    }
    if let Some(function_name) = resolve_external_frame(&rendered).and_then(|f| f.function_name) {
        metadata.insert("function_name".into(), Value::from(function_name));
    }

    let details = ErrorDetails::without_trace(kind.as_str());
    client.emit_error_with_trace(kind.message().to_string(), Some(&details), metadata, Location::caller());
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
