/// Errors raised while constructing a [`LogClient`](crate::client::LogClient).
///
/// These are the only failures that reach the application: once a client
/// exists, logging calls never fail.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("the log shipper must be spawned from within a tokio runtime")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[cfg(feature = "http")]
    #[error("failed to build the collector HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Errors from the process-wide panic hook registration.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum HookError {
    #[error("a global error hook is already installed by another log client")]
    AlreadyInstalled,
}
