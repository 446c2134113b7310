use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExporterError, Result};
use crate::model::ServerName;
use crate::platform::fs::parse_mode;

/// Selector value meaning "every server barman knows about".
pub const ALL_SERVERS: &str = "all";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    /// `HOST:PORT` for the HTTP endpoint.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Servers to export, or `["all"]`.
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,

    /// Seconds between refreshes of the cached barman output.
    #[serde(default = "default_cache_time")]
    pub cache_time: u64,

    /// Path or name of the barman executable.
    #[serde(default = "default_barman_bin")]
    pub barman_bin: String,

    /// Per-invocation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub textfile: TextfileConfig,

    /// Log output format: "json" or "pretty".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextfileConfig {
    #[serde(default = "default_textfile_owner")]
    pub user: String,
    #[serde(default = "default_textfile_owner")]
    pub group: String,
    /// Octal permission bits as text, e.g. "0644".
    #[serde(default = "default_textfile_mode")]
    pub mode: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            servers: default_servers(),
            cache_time: default_cache_time(),
            barman_bin: default_barman_bin(),
            timeout: default_timeout(),
            textfile: TextfileConfig::default(),
            log_format: default_log_format(),
        }
    }
}

impl Default for TextfileConfig {
    fn default() -> Self {
        Self {
            user: default_textfile_owner(),
            group: default_textfile_owner(),
            mode: default_textfile_mode(),
        }
    }
}

fn default_listen_address() -> String {
    "127.0.0.1:9780".to_string()
}

fn default_servers() -> Vec<String> {
    vec![ALL_SERVERS.to_string()]
}

fn default_cache_time() -> u64 {
    3600
}

fn default_barman_bin() -> String {
    "barman".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_textfile_owner() -> String {
    "prometheus".to_string()
}

fn default_textfile_mode() -> String {
    "0644".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl ExporterConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExporterError::Config(format!("cannot read config file '{}': {e}", path.display()))
        })?;
        Self::from_yaml(&text)
            .map_err(|e| ExporterError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn refresh_interval(&self) -> Result<Duration> {
        positive_seconds("cache_time", self.cache_time)
    }

    pub fn command_timeout(&self) -> Result<Duration> {
        positive_seconds("timeout", self.timeout)
    }

    pub fn selector(&self) -> Result<ServerSelector> {
        ServerSelector::from_names(&self.servers)
    }

    pub fn listen(&self) -> Result<ListenAddress> {
        self.listen_address.parse()
    }

    pub fn textfile_mode(&self) -> Result<u32> {
        parse_mode(&self.textfile.mode).map_err(ExporterError::Config)
    }
}

fn positive_seconds(key: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(ExporterError::Config(format!("{key} must be at least 1 second")));
    }
    Ok(Duration::from_secs(secs))
}

/// Which servers a refresh covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerSelector {
    /// Ask barman for its server list on every refresh.
    All,
    Explicit(Vec<ServerName>),
}

impl ServerSelector {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let names: Vec<&str> = names.iter().map(|n| n.as_ref().trim()).collect();
        if names.is_empty() || names == [ALL_SERVERS] {
            return Ok(ServerSelector::All);
        }
        if names.contains(&ALL_SERVERS) {
            return Err(ExporterError::Config(format!(
                "'{ALL_SERVERS}' cannot be combined with explicit server names"
            )));
        }

        let mut servers: Vec<ServerName> = Vec::with_capacity(names.len());
        for name in names {
            let server = ServerName::new(name)?;
            if !servers.contains(&server) {
                servers.push(server);
            }
        }
        Ok(ServerSelector::Explicit(servers))
    }
}

impl fmt::Display for ServerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerSelector::All => f.write_str(ALL_SERVERS),
            ServerSelector::Explicit(servers) => {
                let names: Vec<&str> = servers.iter().map(ServerName::as_str).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

/// Validated `HOST:PORT` listen address. The host is kept as text so names
/// like `localhost` resolve at bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddress {
    host: String,
    port: u16,
}

impl ListenAddress {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for ListenAddress {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            ExporterError::Config(format!(
                "Incorrect '--listen-address' value: '{s}'. Use HOST:PORT."
            ))
        };
        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let host = match host.strip_prefix('[') {
            Some(inner) => inner.strip_suffix(']').ok_or_else(invalid)?,
            None if host.contains(':') => return Err(invalid()),
            None => host,
        };
        if host.is_empty() {
            return Err(invalid());
        }
        let port: u16 = port.parse().map_err(|_| invalid())?;
        if port == 0 {
            return Err(invalid());
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
