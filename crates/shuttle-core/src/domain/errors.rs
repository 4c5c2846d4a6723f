//! Errors - エラー型と分類

use thiserror::Error;

use super::ids::TaskId;

/// Problems with a status report. None of these change job state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("status update for unknown task {0}")]
    UnknownTask(TaskId),
}

/// Problems loading or validating `JobOptions`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Host name resolution failures. Callers fall back to the bare host name.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("lookup of {host} failed: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no address found for {0}")]
    NoAddress(String),
}
