use std::fmt;
use std::str::FromStr;

use crate::error::{ExporterError, Result};

/// Oldest barman release whose JSON output the exporter understands.
pub const MIN_BARMAN_VERSION: ToolVersion = ToolVersion::new(2, 9, 0);

/// `major.minor[.patch]` version. Missing components compare as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ToolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ToolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Take the version from the first token of `barman -v` output, e.g.
    /// `"3.10.0 Barman by EnterpriseDB"`.
    pub fn from_banner(banner: &str) -> Result<Self> {
        let token = banner
            .split_whitespace()
            .next()
            .ok_or_else(|| ExporterError::InvalidVersion(banner.trim().to_string()))?;
        token.parse()
    }

    pub fn ensure_at_least(&self, required: &ToolVersion) -> Result<()> {
        if self < required {
            return Err(ExporterError::UnsupportedVersion {
                found: self.to_string(),
                required: required.to_string(),
            });
        }
        Ok(())
    }
}

impl FromStr for ToolVersion {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ExporterError::InvalidVersion(s.to_string());
        let mut parts = s.trim().trim_start_matches('v').split('.');

        let major = parts.next().and_then(leading_number).ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(p) => leading_number(p).ok_or_else(invalid)?,
            None => 0,
        };
        // Patch level may carry a pre-release suffix ("0a1", "1rc2").
        let patch = parts.next().and_then(leading_number).unwrap_or(0);

        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

fn leading_number(s: &str) -> Option<u32> {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}
