use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use barman_exporter_core::metrics::{content_type, render_snapshot};

use crate::error::ServerError;
use crate::state::AppState;

/// GET /metrics: exposition text for the current snapshot.
///
/// Served from the cache only; a scrape never runs barman.
pub async fn metrics(State(state): State<AppState>) -> Result<Response, ServerError> {
    let snapshot = state.cache().current();
    let body = render_snapshot(&snapshot)?;
    Ok(([(header::CONTENT_TYPE, content_type())], body).into_response())
}
