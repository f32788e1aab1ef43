//! Environment variable names read by [`ClientConfig::from_env`].
//!
//! These are purely helpers; the client itself never touches the
//! environment unless asked to.
//!
//! [`ClientConfig::from_env`]: crate::config::ClientConfig::from_env

/// Collector base URL, e.g. `http://127.0.0.1:8000`.
pub const LOG_SERVER_URL_ENV: &str = "LOG_SERVER_URL";

/// Logical service name attached to every entry.
pub const SERVICE_NAME_ENV: &str = "SERVICE_NAME";

/// Deployment environment (`production`, `staging`, ...).
pub const ENVIRONMENT_ENV: &str = "ENVIRONMENT";

/// Service version, e.g. `v1.2.3`.
pub const SERVICE_VERSION_ENV: &str = "SERVICE_VERSION";

/// Log type tag, e.g. `BACKEND`.
pub const LOG_TYPE_ENV: &str = "LOG_TYPE";

/// `true` installs the process-wide panic hook.
pub const ENABLE_GLOBAL_ERROR_HANDLER_ENV: &str = "ENABLE_GLOBAL_ERROR_HANDLER";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a non-empty environment variable.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read a boolean flag; only a case-insensitive `true` or `1` enables it.
pub fn env_flag(key: &str) -> bool {
    env_opt(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"))
        .unwrap_or(false)
}
