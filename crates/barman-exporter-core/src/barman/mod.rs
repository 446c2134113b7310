//! Boundary to the `barman` command-line tool.
//!
//! Every call goes through a [`ToolRunner`], so the rest of the crate can be
//! exercised against canned output without a real barman installation.

pub mod schema;
pub mod version;

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{AdapterError, AdapterErrorKind, Result};
use crate::platform::shell::run_command_with_timeout;

pub use version::{MIN_BARMAN_VERSION, ToolVersion};

/// Flag pair selecting barman's JSON output formatter. Passed first on every
/// structured call.
pub const JSON_OUTPUT_ARGS: [&str; 2] = ["-f", "json"];

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw result of one tool invocation that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Executes the external tool. Implementations must enforce their own
/// timeout; only spawn and timeout failures are reported as errors, exit
/// codes are judged by the caller.
pub trait ToolRunner: Send + Sync {
    fn run(&self, args: &[&str]) -> std::result::Result<ToolOutput, AdapterErrorKind>;
}

/// [`ToolRunner`] that spawns the real binary.
#[derive(Debug, Clone)]
pub struct BarmanCli {
    program: PathBuf,
    timeout: Duration,
}

impl BarmanCli {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Default for BarmanCli {
    fn default() -> Self {
        Self::new("barman", DEFAULT_TIMEOUT)
    }
}

impl ToolRunner for BarmanCli {
    fn run(&self, args: &[&str]) -> std::result::Result<ToolOutput, AdapterErrorKind> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        match run_command_with_timeout(&mut cmd, self.timeout) {
            Ok(output) => Ok(ToolOutput {
                code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                Err(AdapterErrorKind::Timeout(self.timeout))
            }
            Err(e) => Err(AdapterErrorKind::Spawn(e)),
        }
    }
}

/// The barman subcommands the exporter relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subcommand {
    ListServer,
    Status,
    Check,
    ListBackup,
    ShowBackup,
}

impl Subcommand {
    pub fn name(self) -> &'static str {
        match self {
            Subcommand::ListServer => "list-server",
            Subcommand::Status => "status",
            Subcommand::Check => "check",
            Subcommand::ListBackup => "list-backup",
            Subcommand::ShowBackup => "show-backup",
        }
    }

    /// Exit codes that still carry a valid JSON payload. `check` exits 1
    /// when at least one check fails.
    pub fn accepted_exit_codes(self) -> &'static [i32] {
        match self {
            Subcommand::Check => &[0, 1],
            _ => &[0],
        }
    }
}

/// Typed access to barman on top of a [`ToolRunner`].
pub struct Barman<R> {
    runner: R,
}

impl<R: ToolRunner> Barman<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `barman -f json <subcommand> <args..>` and parse its stdout.
    pub fn run_command(
        &self,
        subcommand: Subcommand,
        args: &[&str],
    ) -> std::result::Result<Value, AdapterError> {
        let mut argv: Vec<&str> = JSON_OUTPUT_ARGS.to_vec();
        argv.push(subcommand.name());
        argv.extend_from_slice(args);

        let output = self.invoke(&argv, subcommand.accepted_exit_codes())?;
        serde_json::from_slice(&output.stdout).map_err(|e| AdapterError {
            command: command_line(&argv),
            kind: AdapterErrorKind::InvalidJson(e),
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
        })
    }

    /// Query the installed barman version (`barman -v`).
    pub fn version(&self) -> Result<ToolVersion> {
        let output = self.invoke(&["-v"], &[0])?;
        // Some releases print the banner on stderr.
        let text = if output.stdout.iter().all(u8::is_ascii_whitespace) {
            output.stderr_lossy()
        } else {
            output.stdout_lossy()
        };
        ToolVersion::from_banner(&text)
    }

    /// Fail unless the installed barman is at least [`MIN_BARMAN_VERSION`].
    pub fn ensure_supported_version(&self) -> Result<ToolVersion> {
        let found = self.version()?;
        found.ensure_at_least(&MIN_BARMAN_VERSION)?;
        tracing::info!(version = %found, "barman version check passed");
        Ok(found)
    }

    pub fn list_servers(&self) -> std::result::Result<Value, AdapterError> {
        self.run_command(Subcommand::ListServer, &[])
    }

    pub fn status(&self, server: &str) -> std::result::Result<Value, AdapterError> {
        self.run_command(Subcommand::Status, &[server])
    }

    pub fn check(&self, server: &str) -> std::result::Result<Value, AdapterError> {
        self.run_command(Subcommand::Check, &[server])
    }

    pub fn list_backups(&self, server: &str) -> std::result::Result<Value, AdapterError> {
        self.run_command(Subcommand::ListBackup, &[server])
    }

    pub fn show_backup(
        &self,
        server: &str,
        backup_id: &str,
    ) -> std::result::Result<Value, AdapterError> {
        self.run_command(Subcommand::ShowBackup, &[server, backup_id])
    }

    fn invoke(
        &self,
        argv: &[&str],
        accepted: &[i32],
    ) -> std::result::Result<ToolOutput, AdapterError> {
        let command = command_line(argv);
        let started = Instant::now();
        tracing::debug!(command = %command, "running barman");

        let output = self.runner.run(argv).map_err(|kind| AdapterError {
            command: command.clone(),
            kind,
            stdout: String::new(),
            stderr: String::new(),
        })?;

        tracing::debug!(
            command = %command,
            code = ?output.code,
            duration = ?started.elapsed(),
            "barman finished"
        );

        match output.code {
            Some(code) if accepted.contains(&code) => Ok(output),
            Some(code) => Err(AdapterError {
                command,
                kind: AdapterErrorKind::ExitCode(code),
                stdout: output.stdout_lossy(),
                stderr: output.stderr_lossy(),
            }),
            None => Err(AdapterError {
                command,
                kind: AdapterErrorKind::Signal,
                stdout: output.stdout_lossy(),
                stderr: output.stderr_lossy(),
            }),
        }
    }
}

fn command_line(argv: &[&str]) -> String {
    let mut line = String::from("barman");
    for arg in argv {
        line.push(' ');
        line.push_str(arg);
    }
    line
}
