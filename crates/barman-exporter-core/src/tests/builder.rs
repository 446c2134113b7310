use std::time::Duration;

use crate::barman::Barman;
use crate::builder::SnapshotBuilder;
use crate::config::ServerSelector;
use crate::error::AdapterErrorKind;
use crate::metrics::emit;
use crate::model::{ServerEntry, Snapshot};
use crate::testutil::{FakeRunner, FakeServer, done, failed, install_server_list};

fn build(runner: FakeRunner, selector: ServerSelector) -> (Snapshot, SnapshotBuilder<FakeRunner>) {
    let builder = SnapshotBuilder::new(Barman::new(runner), selector);
    let snapshot = builder.build().unwrap();
    (snapshot, builder)
}

fn explicit(names: &[&str]) -> ServerSelector {
    ServerSelector::from_names(names).unwrap()
}

#[test]
fn explicit_selector_skips_discovery() {
    let runner = FakeRunner::new();
    FakeServer::new("pg1").install(&runner);

    let (snapshot, builder) = build(runner, explicit(&["pg1"]));
    assert_eq!(builder.barman().runner().calls_to("list-server"), 0);
    assert!(matches!(snapshot.server("pg1"), Some(ServerEntry::Collected(_))));
}

#[test]
fn explicit_order_is_kept() {
    let runner = FakeRunner::new();
    FakeServer::new("zeta").install(&runner);
    FakeServer::new("alpha").install(&runner);

    let (snapshot, _) = build(runner, explicit(&["zeta", "alpha"]));
    let names: Vec<&str> = snapshot.servers().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha"]);
}

#[test]
fn discovery_failure_fails_the_build() {
    let runner = FakeRunner::new();
    runner.fail(
        &["-f", "json", "list-server"],
        AdapterErrorKind::Timeout(Duration::from_secs(10)),
    );
    let builder = SnapshotBuilder::new(Barman::new(runner), ServerSelector::All);
    assert!(builder.build().is_err());
}

#[test]
fn failing_server_is_isolated() {
    let runner = FakeRunner::new();
    install_server_list(&runner, &["bad", "good"]);
    let mut good = FakeServer::new("good");
    good.backups = vec![done("20240102T000000", 2048, 128)];
    good.last_backup = "20240102T000000";
    good.install(&runner);
    runner.respond(&["-f", "json", "status", "bad"], Some(1), "", "ERROR: Unknown server 'bad'");

    let (snapshot, builder) = build(runner, ServerSelector::All);

    match snapshot.server("bad") {
        Some(ServerEntry::Failed(msg)) => assert!(msg.contains("status"), "{msg}"),
        other => panic!("unexpected entry: {other:?}"),
    }
    // No follow-up calls for a server that already failed.
    assert_eq!(builder.barman().runner().calls_to("list-backup"), 1);

    let ServerEntry::Collected(data) = snapshot.server("good").unwrap() else {
        panic!("good server was not collected");
    };
    assert_eq!(data.backups.len(), 1);
    assert!(data.status.last_backup.is_some());

    let samples = emit(&snapshot);
    assert!(samples.iter().all(|s| s.label("server") == Some("good")));
}

#[test]
fn malformed_payload_fails_only_that_server() {
    let runner = FakeRunner::new();
    FakeServer::new("pg1").install(&runner);
    FakeServer::new("pg2").install(&runner);
    runner.stdout(&["-f", "json", "list-backup", "pg2"], r#"{"pg2": {"not": "a list"}}"#);

    let (snapshot, _) = build(runner, explicit(&["pg1", "pg2"]));
    assert!(matches!(snapshot.server("pg1"), Some(ServerEntry::Collected(_))));
    assert!(matches!(snapshot.server("pg2"), Some(ServerEntry::Failed(_))));
}

#[test]
fn only_latest_done_backup_is_inspected() {
    let runner = FakeRunner::new();
    let mut server = FakeServer::new("pg1");
    server.backups = vec![
        failed("20240103T000000"),
        done("20240102T000000", 300, 30),
        done("20240101T000000", 200, 20),
    ];
    server.copy_time = 42.5;
    server.install(&runner);

    let (snapshot, builder) = build(runner, explicit(&["pg1"]));
    let calls = builder.barman().runner().calls();
    let detail_calls: Vec<_> = calls.iter().filter(|c| c.contains(&"show-backup".to_string())).collect();
    assert_eq!(detail_calls.len(), 1);
    assert_eq!(detail_calls[0].last().map(String::as_str), Some("20240102T000000"));

    let ServerEntry::Collected(data) = snapshot.server("pg1").unwrap() else {
        panic!("pg1 was not collected");
    };
    assert_eq!(data.last_backup_copy_time, Some(42.5));
}

#[test]
fn no_done_backups_means_zero_copy_time_without_detail_call() {
    let runner = FakeRunner::new();
    let mut server = FakeServer::new("pg1");
    server.backups = vec![failed("20240101T000000")];
    server.install(&runner);

    let (snapshot, builder) = build(runner, explicit(&["pg1"]));
    assert_eq!(builder.barman().runner().calls_to("show-backup"), 0);
    let ServerEntry::Collected(data) = snapshot.server("pg1").unwrap() else {
        panic!("pg1 was not collected");
    };
    assert_eq!(data.last_backup_copy_time, Some(0.0));
}

#[test]
fn failing_detail_call_fails_the_server() {
    let runner = FakeRunner::new();
    let mut server = FakeServer::new("pg1");
    server.backups = vec![done("20240101T000000", 1, 1)];
    server.install(&runner);
    runner.fail(
        &["-f", "json", "show-backup", "pg1", "20240101T000000"],
        AdapterErrorKind::Timeout(Duration::from_secs(10)),
    );

    let (snapshot, _) = build(runner, explicit(&["pg1"]));
    match snapshot.server("pg1") {
        Some(ServerEntry::Failed(msg)) => assert!(msg.contains("timed out"), "{msg}"),
        other => panic!("unexpected entry: {other:?}"),
    }
}

#[test]
fn snapshot_timestamps_bracket_capture() {
    let runner = FakeRunner::new();
    FakeServer::new("pg1").install(&runner);

    let (snapshot, _) = build(runner, explicit(&["pg1"]));
    let started = snapshot.started_at().unwrap();
    let completed = snapshot.completed_at().unwrap();
    let ServerEntry::Collected(data) = snapshot.server("pg1").unwrap() else {
        panic!("pg1 was not collected");
    };
    assert!(started <= data.captured_at && data.captured_at <= completed);
    assert!(snapshot.is_populated());
}
