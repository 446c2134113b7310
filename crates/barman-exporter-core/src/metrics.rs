//! Metric set derived from a [`Snapshot`], and its text exposition.

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::error::Result;
use crate::model::{ServerData, ServerName, Snapshot};

/// Static description of one exported gauge family.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDef {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

pub const BACKUPS_TOTAL: MetricDef = MetricDef {
    name: "barman_backups_total",
    help: "Total number of backups",
    labels: &["server"],
};

pub const BACKUPS_FAILED: MetricDef = MetricDef {
    name: "barman_backups_failed",
    help: "Number of backups that are not in DONE state",
    labels: &["server"],
};

pub const BACKUP_SIZE_BYTES: MetricDef = MetricDef {
    name: "barman_backup_size_bytes",
    help: "Size of available backups, position 1 is the most recent",
    labels: &["server", "position"],
};

pub const BACKUP_WAL_SIZE_BYTES: MetricDef = MetricDef {
    name: "barman_backup_wal_size_bytes",
    help: "WAL size of available backups, position 1 is the most recent",
    labels: &["server", "position"],
};

pub const LAST_BACKUP_TIMESTAMP: MetricDef = MetricDef {
    name: "barman_last_backup_timestamp",
    help: "Last available backup as a Unix timestamp",
    labels: &["server"],
};

pub const FIRST_BACKUP_TIMESTAMP: MetricDef = MetricDef {
    name: "barman_first_backup_timestamp",
    help: "First available backup as a Unix timestamp",
    labels: &["server"],
};

pub const LAST_BACKUP_COPY_TIME_SECONDS: MetricDef = MetricDef {
    name: "barman_last_backup_copy_time_seconds",
    help: "Copy time of the last successful backup",
    labels: &["server"],
};

pub const CHECK_OK: MetricDef = MetricDef {
    name: "barman_check_ok",
    help: "Barman check outcome (1 = OK, 0 = failed)",
    labels: &["server", "check_name"],
};

pub const METRICS_LAST_UPDATE_TIMESTAMP: MetricDef = MetricDef {
    name: "barman_metrics_last_update_timestamp",
    help: "Unix timestamp at which these server metrics were collected",
    labels: &["server"],
};

pub const ALL_METRICS: [&MetricDef; 9] = [
    &BACKUPS_TOTAL,
    &BACKUPS_FAILED,
    &BACKUP_SIZE_BYTES,
    &BACKUP_WAL_SIZE_BYTES,
    &LAST_BACKUP_TIMESTAMP,
    &FIRST_BACKUP_TIMESTAMP,
    &LAST_BACKUP_COPY_TIME_SECONDS,
    &CHECK_OK,
    &METRICS_LAST_UPDATE_TIMESTAMP,
];

/// One observation. `labels` are values in the order of `metric.labels`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: &'static MetricDef,
    pub labels: Vec<String>,
    pub value: f64,
}

impl Sample {
    fn new(metric: &'static MetricDef, labels: Vec<String>, value: f64) -> Self {
        debug_assert_eq!(metric.labels.len(), labels.len());
        Self {
            metric,
            labels,
            value,
        }
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.metric
            .labels
            .iter()
            .position(|l| *l == name)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }
}

/// Walk the snapshot and produce every sample. Servers whose collection
/// failed contribute nothing; unknown values are omitted rather than
/// reported as zero.
pub fn emit(snapshot: &Snapshot) -> Vec<Sample> {
    let mut samples = Vec::new();
    for (name, data) in snapshot.collected() {
        emit_server(name, data, &mut samples);
    }
    samples
}

fn emit_server(name: &ServerName, data: &ServerData, out: &mut Vec<Sample>) {
    let server = || vec![name.to_string()];

    out.push(Sample::new(&BACKUPS_TOTAL, server(), data.backups.len() as f64));
    out.push(Sample::new(&BACKUPS_FAILED, server(), data.failed_count() as f64));

    for (position, backup) in (1..).zip(data.done_backups()) {
        let labels = vec![name.to_string(), position.to_string()];
        out.push(Sample::new(&BACKUP_SIZE_BYTES, labels.clone(), backup.size_bytes as f64));
        out.push(Sample::new(&BACKUP_WAL_SIZE_BYTES, labels, backup.wal_size_bytes as f64));
    }

    if let Some(ts) = data.status.last_backup {
        out.push(Sample::new(&LAST_BACKUP_TIMESTAMP, server(), ts.timestamp() as f64));
    }
    if let Some(ts) = data.status.first_backup {
        out.push(Sample::new(&FIRST_BACKUP_TIMESTAMP, server(), ts.timestamp() as f64));
    }
    if let Some(copy_time) = data.last_backup_copy_time {
        out.push(Sample::new(&LAST_BACKUP_COPY_TIME_SECONDS, server(), copy_time));
    }

    for (check, ok) in &data.checks {
        let value = if *ok { 1.0 } else { 0.0 };
        out.push(Sample::new(&CHECK_OK, vec![name.to_string(), check.clone()], value));
    }

    out.push(Sample::new(
        &METRICS_LAST_UPDATE_TIMESTAMP,
        server(),
        data.captured_at.timestamp() as f64,
    ));
}

/// Encode samples in the Prometheus text exposition format. A fresh
/// registry is used per call so the output depends only on `samples`.
pub fn render(samples: &[Sample]) -> Result<String> {
    let registry = Registry::new();
    let mut families = Vec::with_capacity(ALL_METRICS.len());
    for def in ALL_METRICS {
        let family = GaugeVec::new(Opts::new(def.name, def.help), def.labels)?;
        registry.register(Box::new(family.clone()))?;
        families.push((def, family));
    }

    for sample in samples {
        let Some((_, family)) = families.iter().find(|(def, _)| *def == sample.metric) else {
            continue;
        };
        let labels: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
        family.get_metric_with_label_values(&labels)?.set(sample.value);
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::error::ExporterError::Metrics(e.to_string()))
}

pub fn render_snapshot(snapshot: &Snapshot) -> Result<String> {
    render(&emit(snapshot))
}

/// Content type for [`render`] output.
pub fn content_type() -> &'static str {
    prometheus::TEXT_FORMAT
}
