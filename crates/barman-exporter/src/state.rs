use std::sync::Arc;
use std::time::Instant;

use barman_exporter_core::cache::SnapshotCache;

/// Shared application state, wrapped in Arc for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    /// Written only by the refresh loop; handlers read the current snapshot.
    pub cache: Arc<SnapshotCache>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(cache: Arc<SnapshotCache>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                cache,
                start_time: Instant::now(),
            }),
        }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.inner.cache
    }
}
