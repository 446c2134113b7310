use std::time::Instant;

use chrono::Utc;

use crate::barman::{Barman, ToolRunner};
use crate::config::ServerSelector;
use crate::error::{ExporterError, Result};
use crate::mapper;
use crate::model::{ServerData, ServerEntry, ServerName, ServerReport, Snapshot};

/// Gathers one complete [`Snapshot`] by querying barman server by server.
pub struct SnapshotBuilder<R> {
    barman: Barman<R>,
    selector: ServerSelector,
}

impl<R: ToolRunner> SnapshotBuilder<R> {
    pub fn new(barman: Barman<R>, selector: ServerSelector) -> Self {
        Self { barman, selector }
    }

    pub fn barman(&self) -> &Barman<R> {
        &self.barman
    }

    /// Build a snapshot. A failing server is recorded as
    /// [`ServerEntry::Failed`]; only a failure to discover the server list
    /// fails the whole build.
    pub fn build(&self) -> Result<Snapshot> {
        let started_at = Utc::now();
        let started = Instant::now();
        let servers = self.resolve_servers()?;

        let mut reports = Vec::with_capacity(servers.len());
        for name in servers {
            let entry = match self.collect_server(&name) {
                Ok(data) => {
                    tracing::debug!(
                        server = %name,
                        backups = data.backups.len(),
                        checks = data.checks.len(),
                        "server collected"
                    );
                    ServerEntry::Collected(data)
                }
                Err(e) => {
                    log_server_failure(&name, &e);
                    ServerEntry::Failed(e.to_string())
                }
            };
            reports.push(ServerReport { name, entry });
        }

        let snapshot = Snapshot::new(reports, started_at, Utc::now());
        tracing::info!(
            servers = snapshot.servers().len(),
            failed = snapshot.failed().count(),
            duration = ?started.elapsed(),
            "snapshot built"
        );
        Ok(snapshot)
    }

    fn resolve_servers(&self) -> Result<Vec<ServerName>> {
        match &self.selector {
            ServerSelector::Explicit(servers) => Ok(servers.clone()),
            ServerSelector::All => {
                let json = self.barman.list_servers()?;
                let servers = mapper::map_server_list(&json)?;
                tracing::debug!(count = servers.len(), "discovered servers");
                Ok(servers)
            }
        }
    }

    fn collect_server(&self, server: &ServerName) -> Result<ServerData> {
        let name = server.as_str();
        let status = mapper::map_status(&self.barman.status(name)?, server)?;
        let checks = mapper::map_check(&self.barman.check(name)?, server)?;
        let backups = mapper::map_backup_list(&self.barman.list_backups(name)?, server)?;

        // Only the newest completed backup is inspected; one extra call per
        // server per cycle.
        let last_backup_copy_time = match backups.iter().find(|b| b.status.is_done()) {
            Some(latest) => {
                let detail = self.barman.show_backup(name, &latest.backup_id)?;
                mapper::map_backup_detail(&detail, server, &latest.backup_id)?
            }
            None => Some(0.0),
        };

        Ok(ServerData {
            status,
            checks,
            backups,
            last_backup_copy_time,
            captured_at: Utc::now(),
        })
    }
}

fn log_server_failure(server: &ServerName, error: &ExporterError) {
    match error {
        ExporterError::Adapter(e) => tracing::warn!(
            server = %server,
            error = %e,
            stderr = %e.stderr.trim(),
            "server collection failed"
        ),
        other => tracing::warn!(server = %server, error = %other, "server collection failed"),
    }
}
