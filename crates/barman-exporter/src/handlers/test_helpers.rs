use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use chrono::Utc;
use tower::ServiceExt;

use barman_exporter_core::Result;
use barman_exporter_core::cache::{SnapshotCache, SnapshotSource};
use barman_exporter_core::model::{
    BackupRecord, BackupStatus, CheckResult, ServerData, ServerEntry, ServerName, ServerReport,
    ServerStatus, Snapshot,
};

use crate::state::AppState;

/// Create a wired-up router around an empty cache.
pub fn setup_app() -> (Router, AppState) {
    let state = AppState::new(Arc::new(SnapshotCache::new()));
    let router = super::router(state.clone());
    (router, state)
}

struct Fixed(Snapshot);

impl SnapshotSource for Fixed {
    fn build(&self) -> Result<Snapshot> {
        Ok(self.0.clone())
    }
}

/// Install `snapshot` through the same path the refresh loop uses.
pub fn install(state: &AppState, snapshot: Snapshot) {
    state.cache().refresh_once(&Fixed(snapshot));
}

/// One collected server (`pg1`, two done backups and one failed) and one
/// server whose collection failed (`pg2`).
pub fn sample_snapshot() -> Snapshot {
    let now = Utc::now();
    let mut checks = CheckResult::new();
    checks.insert("archiver".into(), true);
    checks.insert("backup_maximum_age".into(), false);

    let record = |id: &str, status: BackupStatus, size: u64| BackupRecord {
        backup_id: id.to_string(),
        status,
        size_bytes: size,
        wal_size_bytes: size / 8,
    };

    let pg1 = ServerData {
        status: ServerStatus {
            first_backup: Some(now),
            last_backup: Some(now),
        },
        checks,
        backups: vec![
            record("20240103T000000", BackupStatus::Failed, 0),
            record("20240102T000000", BackupStatus::Done, 4096),
            record("20240101T000000", BackupStatus::Done, 2048),
        ],
        last_backup_copy_time: Some(30.0),
        captured_at: now,
    };

    Snapshot::new(
        vec![
            ServerReport {
                name: ServerName::new("pg1").unwrap(),
                entry: ServerEntry::Collected(pg1),
            },
            ServerReport {
                name: ServerName::new("pg2").unwrap(),
                entry: ServerEntry::Failed("`barman -f json status pg2` failed: timed out after 10 seconds".into()),
            },
        ],
        now,
        now,
    )
}

pub async fn get(router: Router, path: &str) -> axum::response::Response {
    let req = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap();
    router.oneshot(req).await.unwrap()
}

pub async fn body_string(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
