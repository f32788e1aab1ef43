//! Non-blocking structured log shipping.
//!
//! [`LogClient`] builds entries on the calling thread, enriches them from the
//! [`context`] propagators and caller inference, and hands them to a
//! background shipper task that batches, optionally gzips and POSTs them to
//! a collector. Failed batches are retried ahead of newer entries.

pub mod record;
pub mod sink;
pub mod queue;
pub mod scheduler;
pub mod shipper;
pub mod context;
pub mod caller;
pub mod trace;
pub mod client;
pub mod hook;
pub mod layer;
pub mod error;
pub mod env;
pub mod config;

#[cfg(feature = "http")]
pub mod http;

pub mod init;
pub mod noop_sink;

pub use client::{LogClient, TimerGuard};
pub use config::ClientConfig;
pub use context::{REQUEST_CONTEXT, USER_CONTEXT};
pub use record::{Level, LogEntry, Metadata};
pub use trace::ErrorDetails;

#[doc(hidden)]
pub use serde_json;
