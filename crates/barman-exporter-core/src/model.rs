use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{ExporterError, Result};

/// Name of a server as configured in barman. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerName(String);

impl ServerName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ExporterError::Config("server name must not be empty".into()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalised check name to pass (`true`) or fail.
pub type CheckResult = BTreeMap<String, bool>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupStatus {
    Done,
    Failed,
    /// Any non-terminal or unrecognised state, e.g. `STARTED`.
    Other(String),
}

impl BackupStatus {
    pub fn from_barman(raw: &str) -> Self {
        match raw {
            "DONE" => BackupStatus::Done,
            "FAILED" => BackupStatus::Failed,
            other => BackupStatus::Other(other.to_string()),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, BackupStatus::Done)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackupRecord {
    pub backup_id: String,
    pub status: BackupStatus,
    pub size_bytes: u64,
    pub wal_size_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStatus {
    pub first_backup: Option<DateTime<Utc>>,
    pub last_backup: Option<DateTime<Utc>>,
}

/// Everything gathered for one server during a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerData {
    pub status: ServerStatus,
    pub checks: CheckResult,
    /// Most recent first, as listed by barman.
    pub backups: Vec<BackupRecord>,
    /// `Some(0.0)` when there is no completed backup; `None` when barman did
    /// not report a copy time for the latest one.
    pub last_backup_copy_time: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl ServerData {
    pub fn done_backups(&self) -> impl Iterator<Item = &BackupRecord> {
        self.backups.iter().filter(|b| b.status.is_done())
    }

    pub fn failed_count(&self) -> usize {
        self.backups.iter().filter(|b| !b.status.is_done()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEntry {
    Collected(ServerData),
    /// Collection failed this cycle; the message is kept for logs and
    /// `/health`, nothing is exported for the server.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerReport {
    pub name: ServerName,
    pub entry: ServerEntry,
}

/// Immutable result of one refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    servers: Vec<ServerReport>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Placeholder served before the first refresh completes.
    pub fn empty() -> Self {
        Self {
            servers: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn new(
        servers: Vec<ServerReport>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            servers,
            started_at: Some(started_at),
            completed_at: Some(completed_at),
        }
    }

    /// False only for the [`Snapshot::empty`] placeholder.
    pub fn is_populated(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn servers(&self) -> &[ServerReport] {
        &self.servers
    }

    pub fn server(&self, name: &str) -> Option<&ServerEntry> {
        self.servers
            .iter()
            .find(|r| r.name.as_str() == name)
            .map(|r| &r.entry)
    }

    pub fn collected(&self) -> impl Iterator<Item = (&ServerName, &ServerData)> {
        self.servers.iter().filter_map(|r| match &r.entry {
            ServerEntry::Collected(data) => Some((&r.name, data)),
            ServerEntry::Failed(_) => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&ServerName, &str)> {
        self.servers.iter().filter_map(|r| match &r.entry {
            ServerEntry::Failed(msg) => Some((&r.name, msg.as_str())),
            ServerEntry::Collected(_) => None,
        })
    }
}
