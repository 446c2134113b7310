use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::barman::ToolRunner;
use crate::builder::SnapshotBuilder;
use crate::error::Result;
use crate::model::Snapshot;

/// Anything that can produce a fresh snapshot.
pub trait SnapshotSource {
    fn build(&self) -> Result<Snapshot>;
}

impl<R: ToolRunner> SnapshotSource for SnapshotBuilder<R> {
    fn build(&self) -> Result<Snapshot> {
        SnapshotBuilder::build(self)
    }
}

/// Holds the snapshot served to readers.
///
/// Readers clone an `Arc` under a short read lock and never wait for a
/// refresh; the write lock is only taken for the pointer swap once the new
/// snapshot is complete. At most one refresh runs at a time.
pub struct SnapshotCache {
    current: RwLock<Arc<Snapshot>>,
    refreshing: AtomicBool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Installed(RefreshSummary),
    /// The build failed as a whole; the previous snapshot is still current.
    Failed(String),
    /// Another refresh was already running.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSummary {
    pub servers: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty())),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&read_unpoisoned(&self.current, "snapshot"))
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Build a new snapshot from `source` and install it.
    pub fn refresh_once<S: SnapshotSource + ?Sized>(&self, source: &S) -> RefreshOutcome {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            tracing::warn!("refresh already in progress; skipping");
            return RefreshOutcome::Skipped;
        };

        let started = Instant::now();
        match source.build() {
            Ok(snapshot) => {
                let summary = RefreshSummary {
                    servers: snapshot.servers().len(),
                    failed: snapshot.failed().count(),
                    elapsed: started.elapsed(),
                };
                self.install(snapshot);
                RefreshOutcome::Installed(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "refresh failed; keeping previous snapshot");
                RefreshOutcome::Failed(e.to_string())
            }
        }
    }

    fn install(&self, snapshot: Snapshot) {
        let next = Arc::new(snapshot);
        let previous = {
            let mut current = write_unpoisoned(&self.current, "snapshot");
            std::mem::replace(&mut *current, next)
        };
        // Freed here unless a reader still holds it.
        drop(previous);
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the refreshing flag on drop, including on unwind.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn read_unpoisoned<'a, T>(lock: &'a RwLock<T>, lock_name: &'static str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                lock = lock_name,
                "rwlock poisoned; continuing with inner state"
            );
            poisoned.into_inner()
        }
    }
}

fn write_unpoisoned<'a, T>(
    lock: &'a RwLock<T>,
    lock_name: &'static str,
) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                lock = lock_name,
                "rwlock poisoned; continuing with inner state"
            );
            poisoned.into_inner()
        }
    }
}
