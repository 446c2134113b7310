use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Value, json};

use crate::barman::{ToolOutput, ToolRunner};
use crate::error::AdapterErrorKind;

enum FakeResponse {
    Output(ToolOutput),
    Timeout(Duration),
    Spawn(std::io::ErrorKind),
}

/// In-memory [`ToolRunner`] answering from canned responses keyed by the
/// exact argument list. Unknown invocations exit with status 2.
pub struct FakeRunner {
    responses: Mutex<HashMap<Vec<String>, FakeResponse>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(&self, args: &[&str], code: Option<i32>, stdout: &str, stderr: &str) {
        self.insert(
            args,
            FakeResponse::Output(ToolOutput {
                code,
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            }),
        );
    }

    pub fn stdout(&self, args: &[&str], stdout: &str) {
        self.respond(args, Some(0), stdout, "");
    }

    pub fn json(&self, args: &[&str], value: &Value) {
        self.stdout(args, &value.to_string());
    }

    pub fn fail(&self, args: &[&str], kind: AdapterErrorKind) {
        let response = match kind {
            AdapterErrorKind::Timeout(d) => FakeResponse::Timeout(d),
            AdapterErrorKind::Spawn(e) => FakeResponse::Spawn(e.kind()),
            other => panic!("FakeRunner cannot simulate {other:?}"),
        };
        self.insert(args, response);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, subcommand: &str) -> usize {
        self.calls()
            .iter()
            .filter(|argv| argv.iter().any(|a| a == subcommand))
            .count()
    }

    fn insert(&self, args: &[&str], response: FakeResponse) {
        let key = args.iter().map(|s| s.to_string()).collect();
        self.responses.lock().unwrap().insert(key, response);
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, args: &[&str]) -> Result<ToolOutput, AdapterErrorKind> {
        let key: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.calls.lock().unwrap().push(key.clone());
        match self.responses.lock().unwrap().get(&key) {
            Some(FakeResponse::Output(out)) => Ok(out.clone()),
            Some(FakeResponse::Timeout(d)) => Err(AdapterErrorKind::Timeout(*d)),
            Some(FakeResponse::Spawn(kind)) => Err(AdapterErrorKind::Spawn((*kind).into())),
            None => Ok(ToolOutput {
                code: Some(2),
                stdout: Vec::new(),
                stderr: format!("unexpected invocation: {}", key.join(" ")).into_bytes(),
            }),
        }
    }
}

/// One backup line for [`FakeServer::backups`].
pub struct FakeBackup {
    pub id: &'static str,
    pub status: &'static str,
    pub size: u64,
    pub wal: u64,
}

pub fn done(id: &'static str, size: u64, wal: u64) -> FakeBackup {
    FakeBackup {
        id,
        status: "DONE",
        size,
        wal,
    }
}

pub fn failed(id: &'static str) -> FakeBackup {
    FakeBackup {
        id,
        status: "FAILED",
        size: 0,
        wal: 0,
    }
}

/// Builder registering the full set of responses for one server.
pub struct FakeServer {
    pub name: &'static str,
    pub first_backup: &'static str,
    pub last_backup: &'static str,
    pub checks: Vec<(&'static str, &'static str)>,
    pub check_exit_code: i32,
    pub backups: Vec<FakeBackup>,
    pub copy_time: f64,
}

impl FakeServer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            first_backup: "None",
            last_backup: "None",
            checks: vec![("postgresql", "OK"), ("archiver errors", "OK")],
            check_exit_code: 0,
            backups: Vec::new(),
            copy_time: 0.0,
        }
    }

    pub fn install(&self, runner: &FakeRunner) {
        let name = self.name;
        runner.json(
            &["-f", "json", "status", name],
            &json!({ name: {
                "active": {"description": "Active", "message": "True"},
                "first_backup": {"description": "First available backup", "message": self.first_backup},
                "last_backup": {"description": "Last available backup", "message": self.last_backup},
            }}),
        );

        let checks: serde_json::Map<String, Value> = self
            .checks
            .iter()
            .map(|(check, status)| (check.to_string(), json!({"status": status, "hint": ""})))
            .collect();
        runner.respond(
            &["-f", "json", "check", name],
            Some(self.check_exit_code),
            &json!({ name: checks }).to_string(),
            "",
        );

        let backups: Vec<Value> = self
            .backups
            .iter()
            .map(|b| {
                if b.status == "DONE" {
                    json!({"backup_id": b.id, "status": b.status, "size_bytes": b.size, "wal_size_bytes": b.wal})
                } else {
                    json!({"backup_id": b.id, "status": b.status})
                }
            })
            .collect();
        runner.json(&["-f", "json", "list-backup", name], &json!({ name: backups }));

        if let Some(latest) = self.backups.iter().find(|b| b.status == "DONE") {
            runner.json(
                &["-f", "json", "show-backup", name, latest.id],
                &json!({ name: {
                    "backup_id": latest.id,
                    "base_backup_information": {"copy_time_seconds": self.copy_time}
                }}),
            );
        }
    }
}

pub fn install_server_list(runner: &FakeRunner, names: &[&str]) {
    let servers: serde_json::Map<String, Value> = names
        .iter()
        .map(|n| (n.to_string(), json!({"description": format!("{n} database")})))
        .collect();
    runner.json(&["-f", "json", "list-server"], &Value::Object(servers));
}
