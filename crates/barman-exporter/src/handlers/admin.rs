use axum::extract::State;
use axum::response::{Html, IntoResponse};

use crate::state::AppState;

/// GET /health: liveness plus whether a snapshot has been installed yet.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.cache().current();
    let failed: Vec<serde_json::Value> = snapshot
        .failed()
        .map(|(name, reason)| serde_json::json!({ "server": name.as_str(), "error": reason }))
        .collect();

    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "populated": snapshot.is_populated(),
        "refreshing": state.cache().is_refreshing(),
        "last_refresh_at": snapshot.completed_at().map(|t| t.to_rfc3339()),
        "servers": snapshot.servers().len(),
        "failed_servers": failed,
        "uptime_seconds": state.inner.start_time.elapsed().as_secs(),
    }))
}

/// GET /: minimal landing page for humans.
pub async fn landing() -> Html<&'static str> {
    Html(concat!(
        "<html><head><title>Barman Exporter</title></head><body>",
        "<h1>Barman Exporter</h1>",
        "<p>Version ",
        env!("CARGO_PKG_VERSION"),
        "</p>",
        "<p><a href=\"/metrics\">Metrics</a></p>",
        "</body></html>",
    ))
}
