//! Conversion of barman JSON payloads into the snapshot model. Pure
//! functions: no I/O, every shape problem becomes an
//! [`ExporterError::Mapping`].

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::barman::schema::{
    BackupDetailReport, BackupListReport, CheckReport, StatusField, StatusReport,
};
use crate::error::{ExporterError, Result};
use crate::model::{BackupRecord, BackupStatus, CheckResult, ServerName, ServerStatus};

/// Layout of backup ids and status timestamps, e.g. `20240131T235959`.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Text barman prints in place of a timestamp that does not exist.
const NONE_SENTINEL: &str = "none";

/// Outcome text of a passing check.
const CHECK_OK: &str = "OK";

pub fn map_server_list(json: &Value) -> Result<Vec<ServerName>> {
    let object = json
        .as_object()
        .ok_or_else(|| ExporterError::Discovery("list-server output is not an object".into()))?;

    let mut servers = Vec::with_capacity(object.len());
    for key in object.keys() {
        match ServerName::new(key.as_str()) {
            Ok(name) => servers.push(name),
            Err(_) => tracing::warn!("ignoring blank server name in list-server output"),
        }
    }
    Ok(servers)
}

pub fn map_status(json: &Value, server: &ServerName) -> Result<ServerStatus> {
    let report: StatusReport = server_payload(json, server)?;
    Ok(ServerStatus {
        first_backup: status_timestamp(report.first_backup.as_ref(), server, "first_backup")?,
        last_backup: status_timestamp(report.last_backup.as_ref(), server, "last_backup")?,
    })
}

pub fn map_check(json: &Value, server: &ServerName) -> Result<CheckResult> {
    let report: CheckReport = server_payload(json, server)?;
    let mut checks = CheckResult::new();
    for (raw_name, entry) in report {
        let name = normalize_check_name(&raw_name);
        if name.is_empty() {
            tracing::warn!(server = %server, check = %raw_name, "ignoring unnamed check");
            continue;
        }
        let ok = entry.status.as_deref() == Some(CHECK_OK);
        // Two raw names may collapse to one key; a failure in either wins.
        checks
            .entry(name)
            .and_modify(|existing| *existing &= ok)
            .or_insert(ok);
    }
    Ok(checks)
}

pub fn map_backup_list(json: &Value, server: &ServerName) -> Result<Vec<BackupRecord>> {
    let entries: BackupListReport = server_payload(json, server)?;
    entries
        .into_iter()
        .map(|entry| {
            let status = BackupStatus::from_barman(&entry.status);
            let (size_bytes, wal_size_bytes) = match (entry.size_bytes, entry.wal_size_bytes) {
                (Some(size), Some(wal)) => (size, wal),
                _ if status.is_done() => {
                    return Err(ExporterError::mapping(
                        server.as_str(),
                        format!("completed backup '{}' has no size information", entry.backup_id),
                    ));
                }
                (size, wal) => (size.unwrap_or(0), wal.unwrap_or(0)),
            };
            Ok(BackupRecord {
                backup_id: entry.backup_id,
                status,
                size_bytes,
                wal_size_bytes,
            })
        })
        .collect()
}

/// Copy time of one backup, `None` if barman did not record it.
pub fn map_backup_detail(json: &Value, server: &ServerName, backup_id: &str) -> Result<Option<f64>> {
    let report: BackupDetailReport = server_payload(json, server)?;
    let copy_time = report
        .base_backup_information
        .and_then(|info| info.copy_time_seconds);
    if copy_time.is_none() {
        tracing::warn!(server = %server, backup_id, "backup detail has no copy time");
    }
    Ok(copy_time)
}

/// Lowercase the name and collapse every run of non-alphanumeric characters
/// into a single `_`, e.g. `"WAL archive"` becomes `wal_archive`.
pub fn normalize_check_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Parse a status timestamp. Empty text and the `None` sentinel mean the
/// value does not exist. Barman writes local time.
pub fn parse_backup_timestamp(text: &str) -> std::result::Result<Option<DateTime<Utc>>, String> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case(NONE_SENTINEL) {
        return Ok(None);
    }
    let naive = NaiveDateTime::parse_from_str(text, BACKUP_TIMESTAMP_FORMAT)
        .map_err(|e| format!("invalid timestamp '{text}': {e}"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| Some(t.with_timezone(&Utc)))
        .ok_or_else(|| format!("timestamp '{text}' does not exist in the local timezone"))
}

fn status_timestamp(
    field: Option<&StatusField>,
    server: &ServerName,
    key: &str,
) -> Result<Option<DateTime<Utc>>> {
    let Some(message) = field.and_then(|f| f.message.as_deref()) else {
        return Ok(None);
    };
    parse_backup_timestamp(message)
        .map_err(|detail| ExporterError::mapping(server.as_str(), format!("{key}: {detail}")))
}

fn server_payload<T: DeserializeOwned>(json: &Value, server: &ServerName) -> Result<T> {
    let payload = json.get(server.as_str()).ok_or_else(|| {
        ExporterError::mapping(server.as_str(), "response has no entry for this server")
    })?;
    serde_json::from_value(payload.clone())
        .map_err(|e| ExporterError::mapping(server.as_str(), e.to_string()))
}
