use std::path::PathBuf;

use clap::Parser;

use barman_exporter_core::config::{ExporterConfig, ListenAddress};
use barman_exporter_core::{ExporterError, Result};

#[derive(Parser)]
#[command(
    name = "barman-exporter",
    version,
    about = "Export barman backup and check status as Prometheus metrics",
    after_help = "\
Output modes (mutually exclusive):
  -l HOST:PORT   serve /metrics over HTTP, refreshing every --cache-time seconds (default)
  -f PATH        write metrics once to PATH for the node_exporter textfile collector
  -d             print metrics once to stdout

Settings from --config are overridden by flags given on the command line."
)]
pub(crate) struct Cli {
    /// Servers to export, or `all` for every server barman knows
    pub servers: Vec<String>,

    /// YAML configuration file
    #[arg(long, env = "BARMAN_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Textfile owner
    #[arg(short, long, value_name = "USER")]
    pub user: Option<String>,

    /// Textfile group
    #[arg(short, long, value_name = "GROUP")]
    pub group: Option<String>,

    /// Textfile mode (octal)
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Number of seconds to cache barman output for
    #[arg(short, long, value_name = "SECONDS")]
    pub cache_time: Option<u64>,

    /// Save output to textfile
    #[arg(short, long, value_name = "TEXTFILE_PATH", conflicts_with_all = ["listen_address", "debug"])]
    pub file: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, value_name = "HOST:PORT", conflicts_with = "debug")]
    pub listen_address: Option<String>,

    /// Print output to stdout
    #[arg(short, long)]
    pub debug: bool,

    /// barman executable
    #[arg(long, value_name = "PATH")]
    pub barman_bin: Option<String>,

    /// Timeout for a single barman invocation in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Log output format: "json" or "pretty"
    #[arg(long)]
    pub log_format: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub(crate) enum OutputMode {
    Serve(ListenAddress),
    Textfile(PathBuf),
    Stdout,
}

impl OutputMode {
    pub fn is_serve(&self) -> bool {
        matches!(self, OutputMode::Serve(_))
    }
}

impl Cli {
    /// Built-in defaults, then the config file, then command-line flags.
    pub fn resolve_config(&self) -> Result<ExporterConfig> {
        let mut config = match &self.config {
            Some(path) => ExporterConfig::load(path)?,
            None => ExporterConfig::default(),
        };

        if !self.servers.is_empty() {
            config.servers = self.servers.clone();
        }
        if let Some(v) = &self.listen_address {
            config.listen_address = v.clone();
        }
        if let Some(v) = self.cache_time {
            config.cache_time = v;
        }
        if let Some(v) = &self.barman_bin {
            config.barman_bin = v.clone();
        }
        if let Some(v) = self.timeout {
            config.timeout = v;
        }
        if let Some(v) = &self.user {
            config.textfile.user = v.clone();
        }
        if let Some(v) = &self.group {
            config.textfile.group = v.clone();
        }
        if let Some(v) = &self.mode {
            config.textfile.mode = v.clone();
        }
        if let Some(v) = &self.log_format {
            config.log_format = v.clone();
        }

        match config.log_format.as_str() {
            "json" | "pretty" => Ok(config),
            other => Err(ExporterError::Config(format!(
                "unknown log format '{other}'; use \"json\" or \"pretty\""
            ))),
        }
    }

    /// The listen address is only validated when it will be used.
    pub fn output_mode(&self, config: &ExporterConfig) -> Result<OutputMode> {
        if self.debug {
            return Ok(OutputMode::Stdout);
        }
        if let Some(path) = &self.file {
            return Ok(OutputMode::Textfile(path.clone()));
        }
        Ok(OutputMode::Serve(config.listen()?))
    }
}
