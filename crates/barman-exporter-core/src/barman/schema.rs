//! Typed views of barman's `-f json` output. Only the fields the exporter
//! reads are declared; anything else in the payload is ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `barman status <server>`: one entry per status line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusReport {
    #[serde(default)]
    pub first_backup: Option<StatusField>,
    #[serde(default)]
    pub last_backup: Option<StatusField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusField {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub message: Option<String>,
}

/// `barman check <server>`: check name to outcome.
pub type CheckReport = BTreeMap<String, CheckEntry>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckEntry {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// `barman list-backup <server>`, most recent first.
pub type BackupListReport = Vec<BackupEntry>;

#[derive(Debug, Clone, Deserialize)]
pub struct BackupEntry {
    pub backup_id: String,
    pub status: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub size_bytes: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub wal_size_bytes: Option<u64>,
}

/// `barman show-backup <server> <backup_id>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackupDetailReport {
    #[serde(default)]
    pub base_backup_information: Option<BaseBackupInformation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaseBackupInformation {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub copy_time_seconds: Option<f64>,
}

/// Barman prints most status messages as strings but some as bare numbers
/// or booleans; collapse all scalars to text.
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match lenient_f64(deserializer)? {
        Some(v) if v.is_finite() && v >= 0.0 => Some(v.round() as u64),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
