//! systemd service control
//!
//! The wizard reads service environments to pre-fill answers and starts,
//! enables and restarts the node and baker units. Everything goes through
//! [`ServiceManager`] so the flow can run against a fake in tests.

use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::process::Command;
use std::sync::OnceLock;

use strum::Display;
use tracing::{debug, info};

use crate::error::{Result, WizardError};

/// Unit-level operations the wizard performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Enable,
}

/// Service control used by the wizard
pub trait ServiceManager: Send + Sync {
    /// Environment of `unit`: its environment files first, then inline
    /// `Environment=` settings on top.
    fn environment(&self, unit: &str) -> Result<HashMap<String, String>>;

    fn run(&self, action: ServiceAction, unit: &str) -> Result<()>;

    /// Persist `key=value` in the environment files of `unit`.
    fn set_environment(&self, unit: &str, key: &str, value: &str) -> Result<()>;
}

pub fn node_unit(network: &str) -> String {
    format!("tezos-node-{}.service", network)
}

pub fn baking_unit(network: &str) -> String {
    format!("tezos-baking-{}.service", network)
}

/// `systemctl` on the local host
#[derive(Debug, Clone, Default)]
pub struct Systemctl {
    dry_run: bool,
}

impl Systemctl {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    fn show(&self, unit: &str) -> Result<String> {
        let output = Command::new("systemctl")
            .args(["show", unit, "--property=Environment", "--property=EnvironmentFiles"])
            .output()
            .map_err(|e| WizardError::external(format!("failed to run systemctl show: {}", e)))?;
        if !output.status.success() {
            return Err(WizardError::external(format!(
                "systemctl show {} failed: {}",
                unit,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ServiceManager for Systemctl {
    fn environment(&self, unit: &str) -> Result<HashMap<String, String>> {
        let shown = self.show(unit)?;
        let mut env = HashMap::new();
        for file in environment_files(&shown) {
            match fs::read_to_string(&file) {
                Ok(contents) => env.extend(parse_env_file(&contents)),
                Err(e) => debug!(%file, error = %e, "Skipping unreadable environment file"),
            }
        }
        env.extend(parse_inline_environment(&shown));
        Ok(env)
    }

    fn run(&self, action: ServiceAction, unit: &str) -> Result<()> {
        if self.dry_run {
            info!("[dry-run] systemctl {} {}", action, unit);
            return Ok(());
        }
        info!("systemctl {} {}", action, unit);
        let status = Command::new("systemctl")
            .arg(action.to_string())
            .arg(unit)
            .status()
            .map_err(|e| WizardError::external(format!("failed to run systemctl: {}", e)))?;
        if status.success() {
            Ok(())
        } else {
            Err(WizardError::external(format!(
                "systemctl {} {} exited with {}",
                action, unit, status
            )))
        }
    }

    fn set_environment(&self, unit: &str, key: &str, value: &str) -> Result<()> {
        let shown = self.show(unit)?;
        let files = environment_files(&shown);
        if files.is_empty() {
            return Err(WizardError::config(format!("{} has no environment file", unit)));
        }
        for file in files {
            if self.dry_run {
                info!("[dry-run] set {}={} in {}", key, value, file);
                continue;
            }
            let contents = fs::read_to_string(&file)?;
            fs::write(&file, replace_env_value(&contents, key, value))?;
            info!(%file, key, "Updated service environment");
        }
        Ok(())
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Paths listed in `EnvironmentFiles=` lines of `systemctl show` output.
pub fn environment_files(shown: &str) -> Vec<String> {
    shown
        .lines()
        .filter_map(|line| line.strip_prefix("EnvironmentFiles="))
        .filter_map(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// `KEY=value` pairs of the `Environment=` line of `systemctl show` output.
pub fn parse_inline_environment(shown: &str) -> HashMap<String, String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(\w+)=("(?:\\.|[^"\\])*"|\S+)"#).expect("static pattern compiles")
    });
    shown
        .lines()
        .filter_map(|line| line.strip_prefix("Environment="))
        .flat_map(|rest| {
            re.captures_iter(rest)
                .map(|c| (c[1].to_string(), c[2].trim_matches('"').to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// `KEY=value` lines of an environment file; quotes around values are dropped.
pub fn parse_env_file(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_'))
        .map(|(key, value)| (key.to_string(), value.trim().trim_matches('"').to_string()))
        .collect()
}

/// Replace the `key=` line of an environment file, appending one if missing.
pub fn replace_env_value(contents: &str, key: &str, value: &str) -> String {
    let prefix = format!("{}=", key);
    let mut replaced = false;
    let mut lines: Vec<String> = contents
        .lines()
        .map(|line| {
            if line.starts_with(&prefix) {
                replaced = true;
                format!("{}{}", prefix, value)
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        lines.push(format!("{}{}", prefix, value));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
