use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinError;

use barman_exporter_core::cache::{RefreshOutcome, SnapshotCache, SnapshotSource};
use barman_exporter_core::scheduler::{NextCycle, next_cycle};

/// Refresh `cache` from `source` once immediately and then every `interval`,
/// until `shutdown` flips or its sender goes away.
///
/// Builds run on the blocking pool since they wait on barman subprocesses.
/// A build that is still running at shutdown is abandoned, not awaited.
pub(crate) async fn run_refresh_loop<S>(
    cache: Arc<SnapshotCache>,
    source: Arc<S>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    S: SnapshotSource + Send + Sync + 'static,
{
    tracing::info!(interval = ?interval, "refresh loop starting");

    loop {
        let cycle_start = Instant::now();
        let task = {
            let cache = Arc::clone(&cache);
            let source = Arc::clone(&source);
            tokio::task::spawn_blocking(move || cache.refresh_once(source.as_ref()))
        };

        tokio::select! {
            joined = task => log_outcome(joined),
            _ = shutdown.changed() => {
                tracing::info!("shutdown requested during refresh, exiting");
                return;
            }
        }

        let delay = match next_cycle(interval, cycle_start.elapsed()) {
            NextCycle::Wait(delay) => {
                log_next_refresh(delay);
                delay
            }
            NextCycle::Overrun { by } => {
                tracing::warn!(
                    interval = ?interval,
                    overrun = ?by,
                    "refresh took longer than the cache time; starting the next one now"
                );
                Duration::ZERO
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                tracing::info!("refresh loop stopped");
                return;
            }
        }
    }
}

fn log_outcome(joined: Result<RefreshOutcome, JoinError>) {
    match joined {
        Ok(RefreshOutcome::Installed(summary)) => {
            if summary.failed > 0 {
                tracing::warn!(
                    servers = summary.servers,
                    failed = summary.failed,
                    duration = ?summary.elapsed,
                    "metrics refreshed with failed servers"
                );
            } else {
                tracing::info!(
                    servers = summary.servers,
                    duration = ?summary.elapsed,
                    "metrics refreshed"
                );
            }
        }
        // Already logged by the cache.
        Ok(RefreshOutcome::Failed(_)) | Ok(RefreshOutcome::Skipped) => {}
        Err(e) if e.is_panic() => {
            tracing::error!("refresh panicked; keeping previous snapshot");
        }
        Err(e) => {
            tracing::error!(error = %e, "refresh task did not complete; keeping previous snapshot");
        }
    }
}

fn log_next_refresh(delay: Duration) {
    let next_wall = chrono::Local::now() + delay;
    tracing::debug!(
        next_refresh = %next_wall.format("%Y-%m-%d %H:%M:%S %Z"),
        delay = ?delay,
        "next refresh scheduled"
    );
}
