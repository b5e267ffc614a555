//! Local node version detection
//!
//! Snapshot resolution compares catalog entries against the version of the
//! installed node, read from `octez-node --version`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;
use std::str::FromStr;
use std::sync::OnceLock;

use tracing::debug;

use crate::error::{Result, WizardError};

/// `(major, minor, rc)` of a node build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeVersion {
    pub major: u32,
    pub minor: u32,
    /// Release candidate number, `None` for stable and dev builds
    pub rc: Option<u32>,
}

impl NodeVersion {
    pub const fn new(major: u32, minor: u32, rc: Option<u32>) -> Self {
        Self { major, minor, rc }
    }

    /// Extract the version from `--version` output such as
    /// `7c1c6a4e (2024-03-26 10:07:31 +0000) (19.1~rc1)`.
    pub fn parse(output: &str) -> Result<Self> {
        let captures = version_regex().captures(output).ok_or_else(|| {
            WizardError::node_version(format!("unrecognised version output '{}'", output.trim()))
        })?;
        let number = |i: usize| -> Result<Option<u32>> {
            captures
                .get(i)
                .map(|m| {
                    m.as_str()
                        .parse::<u32>()
                        .map_err(|e| WizardError::node_version(format!("{}: {}", m.as_str(), e)))
                })
                .transpose()
        };
        let major = number(1)?.ok_or_else(|| WizardError::node_version("missing major version"))?;
        let minor = number(2)?.ok_or_else(|| WizardError::node_version("missing minor version"))?;
        Ok(Self::new(major, minor, number(3)?))
    }

    pub const fn is_release_candidate(&self) -> bool {
        self.rc.is_some()
    }
}

impl fmt::Display for NodeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rc {
            Some(rc) => write!(f, "{}.{}~rc{}", self.major, self.minor, rc),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

impl FromStr for NodeVersion {
    type Err = WizardError;

    /// Short form used on the command line: `19.0` or `19.1~rc1`.
    fn from_str(s: &str) -> Result<Self> {
        let (numbers, rc) = match s.split_once("~rc") {
            Some((numbers, rc)) => (numbers, Some(rc)),
            None => (s, None),
        };
        let (major, minor) = numbers
            .split_once('.')
            .ok_or_else(|| WizardError::node_version(format!("expected MAJOR.MINOR, got '{}'", s)))?;
        let int = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| WizardError::node_version(format!("invalid version '{}'", s)))
        };
        Ok(Self::new(int(major)?, int(minor)?, rc.map(|r| int(r)).transpose()?))
    }
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[a-z0-9]+ \(.*\) \(([0-9]+).([0-9]+)(?:(?:~rc([1-9]+))|(?:\+dev))?\)")
            .expect("static pattern compiles")
    })
}

/// Anything that can report the local node version
pub trait NodeVersionSource: Send + Sync {
    fn node_version(&self) -> Result<NodeVersion>;
}

/// A version known up front
impl NodeVersionSource for NodeVersion {
    fn node_version(&self) -> Result<NodeVersion> {
        Ok(*self)
    }
}

/// Runs `<binary> --version` and parses its output
#[derive(Debug, Clone)]
pub struct CommandVersionSource {
    binary: String,
}

impl CommandVersionSource {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for CommandVersionSource {
    fn default() -> Self {
        Self::new("octez-node")
    }
}

impl NodeVersionSource for CommandVersionSource {
    fn node_version(&self) -> Result<NodeVersion> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| WizardError::node_version(format!("failed to run {}: {}", self.binary, e)))?;
        if !output.status.success() {
            return Err(WizardError::node_version(format!(
                "{} --version exited with {}",
                self.binary, output.status
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = NodeVersion::parse(&stdout)?;
        debug!(binary = %self.binary, %version, "Detected local node version");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stable() {
        let v = NodeVersion::parse("ec3ac4e9 (2024-02-05 13:27:53 +0000) (19.0)\n").unwrap();
        assert_eq!(v, NodeVersion::new(19, 0, None));
        assert!(!v.is_release_candidate());
    }

    #[test]
    fn test_parse_rc_and_dev() {
        let v = NodeVersion::parse("7c1c6a4e (2024-03-26 10:07:31 +0000) (20.0~rc1)").unwrap();
        assert_eq!(v, NodeVersion::new(20, 0, Some(1)));
        let v = NodeVersion::parse("abcdef12 (2024-04-01 00:00:00 +0000) (21.3+dev)").unwrap();
        assert_eq!(v, NodeVersion::new(21, 3, None));
    }

    #[test]
    fn test_parse_failure() {
        let err = NodeVersion::parse("octez-node: command not found").unwrap_err();
        assert!(matches!(err, WizardError::NodeVersion(_)));
    }

    #[test]
    fn test_short_form() {
        assert_eq!("19.1~rc2".parse::<NodeVersion>().unwrap(), NodeVersion::new(19, 1, Some(2)));
        assert_eq!("18.0".parse::<NodeVersion>().unwrap().to_string(), "18.0");
        assert!("nineteen".parse::<NodeVersion>().is_err());
    }
}
