use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use barman_exporter_core::ExporterError;

/// Server error type that maps to HTTP status codes.
///
/// Barman failures never surface here: they are folded into the snapshot
/// by the refresh loop. Only rendering can fail at request time.
#[derive(Debug)]
pub enum ServerError {
    Internal(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        tracing::error!(status = %status, error = %message);
        (status, message).into_response()
    }
}

impl From<ExporterError> for ServerError {
    fn from(e: ExporterError) -> Self {
        Self::Internal(e.to_string())
    }
}
