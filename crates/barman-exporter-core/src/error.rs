use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExporterError>;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("unexpected barman output for server '{server}': {detail}")]
    Mapping { server: String, detail: String },

    #[error("cannot discover barman servers: {0}")]
    Discovery(String),

    #[error("barman version {found} is not supported; version {required}+ required")]
    UnsupportedVersion { found: String, required: String },

    #[error("cannot parse barman version from '{0}'")]
    InvalidVersion(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("metrics encoding error: {0}")]
    Metrics(String),

    #[error("{0}")]
    Other(String),
}

impl ExporterError {
    pub fn mapping(server: &str, detail: impl Into<String>) -> Self {
        ExporterError::Mapping {
            server: server.to_string(),
            detail: detail.into(),
        }
    }
}

impl From<prometheus::Error> for ExporterError {
    fn from(value: prometheus::Error) -> Self {
        ExporterError::Metrics(value.to_string())
    }
}

/// Failure of a single barman invocation. Carries the raw output so the
/// caller can log what the tool actually said.
#[derive(Debug, Error)]
#[error("`{command}` failed: {kind}")]
pub struct AdapterError {
    pub command: String,
    pub kind: AdapterErrorKind,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum AdapterErrorKind {
    #[error("cannot spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("exited with status {0}")]
    ExitCode(i32),

    #[error("terminated by signal")]
    Signal,

    #[error("output is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
}

impl AdapterError {
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, AdapterErrorKind::Timeout(_))
    }
}
