//! Node and client side effects
//!
//! Everything the wizard does to the machine besides service control goes
//! through [`NodeBackend`]: preparing the node data directory, importing a
//! snapshot, and setting up the baker key. [`CommandBackend`] shells out to
//! the octez binaries; in dry-run mode mutating commands are only logged.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::WizardConfig;
use crate::error::{Result, WizardError};
use crate::snapshot::{HttpClient, SnapshotOffer};
use crate::types::KeyImportMode;

/// Files a configured but empty node directory contains
const NODE_CONFIG_FILES: [&str; 2] = ["config.json", "version.json"];
/// Where downloads land before import
const SNAPSHOT_TMP_DIR: &str = "/tmp/baking-setup-snapshot";

/// Where the snapshot comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    File(PathBuf),
    Url { url: String, sha256: Option<String> },
    Provider(SnapshotOffer),
}

/// A snapshot import request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotImport {
    pub network: String,
    pub source: SnapshotSource,
    /// Archive node importing a full snapshot
    pub reconstruct: bool,
}

impl SnapshotImport {
    pub fn block_hash(&self) -> Option<&str> {
        match &self.source {
            SnapshotSource::Provider(offer) => offer.metadata.block_hash.as_deref(),
            _ => None,
        }
    }
}

/// Side effects on the node and client
pub trait NodeBackend {
    /// Entries of the node directory other than its configuration files
    fn node_data(&self, node_dir: &Path) -> Result<Vec<PathBuf>>;

    fn clear_node_data(&self, entries: &[PathBuf]) -> Result<()>;

    /// Initialise the node configuration if needed and set the history mode.
    fn configure_node(&self, config: &WizardConfig) -> Result<()>;

    fn import_snapshot(&self, import: &SnapshotImport) -> Result<()>;

    /// Block until the node RPC answers.
    fn wait_for_node(&self, rpc_endpoint: &str) -> Result<()>;

    /// Address currently stored under the baker alias, if any
    fn baker_key(&self, config: &WizardConfig) -> Result<Option<String>>;

    fn import_key(&self, config: &WizardConfig) -> Result<()>;

    fn register_baker(&self, config: &WizardConfig) -> Result<()>;
}

/// Output of an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// Backend running octez binaries as the `tezos` user
pub struct CommandBackend {
    dry_run: bool,
    run_as: Option<String>,
    client: Arc<dyn HttpClient>,
    poll_interval: Duration,
}

impl CommandBackend {
    pub fn new(client: Arc<dyn HttpClient>, dry_run: bool) -> Self {
        Self {
            dry_run,
            run_as: Some("tezos".to_string()),
            client,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Run commands as the current user instead of through `sudo`.
    pub fn without_sudo(mut self) -> Self {
        self.run_as = None;
        self
    }

    fn command(&self, program: &str, args: &[String]) -> Command {
        match &self.run_as {
            Some(user) => {
                let mut cmd = Command::new("sudo");
                cmd.args(["-u", user.as_str(), program]).args(args);
                cmd
            }
            None => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        }
    }

    /// Run a command that changes the system; skipped in dry-run mode.
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        if self.dry_run {
            info!("[dry-run] {} {}", program, redact(args).join(" "));
            return Ok(CommandOutput {
                success: true,
                ..CommandOutput::default()
            });
        }
        self.query(program, args)?.ensure_success(program)
    }

    /// Run a read-only command, also in dry-run mode.
    fn query(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        info!("Running {} {}", program, redact(args).join(" "));
        let output = self
            .command(program, args)
            .stdin(Stdio::inherit())
            .output()
            .map_err(|e| WizardError::external(format!("failed to run {}: {}", program, e)))?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        })
    }

    fn node_binary(network: &str) -> String {
        format!("octez-node-{}", network)
    }

    fn download(&self, url: &str, sha256: Option<&str>) -> Result<PathBuf> {
        let target = Path::new(SNAPSHOT_TMP_DIR).join("snapshot");
        if !self.dry_run {
            fs::create_dir_all(SNAPSHOT_TMP_DIR)?;
        }
        let args = vec![
            "--fail".to_string(),
            "--location".to_string(),
            "--continue-at".to_string(),
            "-".to_string(),
            "--output".to_string(),
            target.to_string_lossy().into_owned(),
            url.to_string(),
        ];
        info!(%url, "Downloading snapshot");
        if self.dry_run {
            info!("[dry-run] curl {}", args.join(" "));
        } else {
            let status = Command::new("curl")
                .args(&args)
                .status()
                .map_err(|e| WizardError::external(format!("failed to run curl: {}", e)))?;
            if !status.success() {
                return Err(WizardError::external(format!("download of {} failed ({})", url, status)));
            }
        }
        if let Some(expected) = sha256 {
            self.verify_sha256(&target, expected)?;
        }
        Ok(target)
    }

    fn verify_sha256(&self, file: &Path, expected: &str) -> Result<()> {
        if self.dry_run {
            info!("[dry-run] sha256sum {}", file.display());
            return Ok(());
        }
        let output = Command::new("sha256sum")
            .arg(file)
            .output()
            .map_err(|e| WizardError::external(format!("failed to run sha256sum: {}", e)))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let actual = stdout.split_whitespace().next().unwrap_or_default();
        if actual.eq_ignore_ascii_case(expected.trim()) {
            info!("Snapshot checksum verified");
            Ok(())
        } else {
            Err(WizardError::external(format!(
                "snapshot checksum mismatch: expected {}, got {}",
                expected, actual
            )))
        }
    }
}

impl CommandOutput {
    pub fn ensure_success(self, context: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(WizardError::external(format!("{} failed: {}", context, self.stderr.trim())))
        }
    }
}

impl NodeBackend for CommandBackend {
    fn node_data(&self, node_dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(node_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut data = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if !NODE_CONFIG_FILES.iter().any(|f| name == *f) {
                data.push(entry.path());
            }
        }
        data.sort();
        Ok(data)
    }

    fn clear_node_data(&self, entries: &[PathBuf]) -> Result<()> {
        for path in entries {
            self.run("rm", &["-rf".to_string(), path.to_string_lossy().into_owned()])?;
        }
        Ok(())
    }

    fn configure_node(&self, config: &WizardConfig) -> Result<()> {
        let network = config.require("network")?;
        let node_dir = PathBuf::from(config.require("node_data_dir")?);
        let binary = Self::node_binary(network);

        if !node_dir.join("config.json").exists() {
            info!(dir = %node_dir.display(), "Initialising node configuration");
            self.run(
                &binary,
                &[
                    "config".into(),
                    "init".into(),
                    "--network".into(),
                    network.to_string(),
                    "--rpc-addr".into(),
                    config.require("node_rpc_addr")?.to_string(),
                ],
            )?;
        }
        self.run(
            &binary,
            &[
                "config".into(),
                "update".into(),
                "--history-mode".into(),
                config.require("history_mode")?.to_string(),
            ],
        )?;
        Ok(())
    }

    fn import_snapshot(&self, import: &SnapshotImport) -> Result<()> {
        let file = match &import.source {
            SnapshotSource::File(path) => path.clone(),
            SnapshotSource::Url { url, sha256 } => self.download(url, sha256.as_deref())?,
            SnapshotSource::Provider(offer) => {
                self.download(&offer.metadata.url, offer.metadata.sha256.as_deref())?
            }
        };

        let mut args = vec!["snapshot".to_string(), "import".to_string()];
        if import.reconstruct {
            args.push("--reconstruct".into());
        }
        args.push(file.to_string_lossy().into_owned());
        if let Some(hash) = import.block_hash() {
            args.push("--block".into());
            args.push(hash.to_string());
        }
        self.run(&Self::node_binary(&import.network), &args)?;

        if !matches!(import.source, SnapshotSource::File(_)) && !self.dry_run {
            if let Err(e) = fs::remove_dir_all(SNAPSHOT_TMP_DIR) {
                debug!(error = %e, "Could not remove temporary snapshot directory");
            }
        }
        Ok(())
    }

    fn wait_for_node(&self, rpc_endpoint: &str) -> Result<()> {
        if self.dry_run {
            info!("[dry-run] waiting for {}/version", rpc_endpoint);
            return Ok(());
        }
        let url = format!("{}/version", rpc_endpoint.trim_end_matches('/'));
        while let Err(e) = self.client.get(&url) {
            debug!(%url, error = %e, "Node RPC not up yet");
            thread::sleep(self.poll_interval);
        }
        Ok(())
    }

    fn baker_key(&self, config: &WizardConfig) -> Result<Option<String>> {
        let mut args = client_options(config)?;
        args.extend(["show".into(), "address".into(), config.require("baker_alias")?.to_string()]);
        let output = self.query("octez-client", &args)?;
        if !output.success {
            return Ok(None);
        }
        Ok(parse_key_hash(&output.stdout))
    }

    fn import_key(&self, config: &WizardConfig) -> Result<()> {
        let alias = config.require("baker_alias")?.to_string();
        let mode: KeyImportMode = config.parsed("key_import_mode")?;
        let mut args = client_options(config)?;
        let tail: Vec<String> = match mode {
            KeyImportMode::SecretKey => vec![
                "import".into(),
                "secret".into(),
                "key".into(),
                alias,
                config.require("secret_key")?.to_string(),
                "--force".into(),
            ],
            KeyImportMode::Remote => vec![
                "import".into(),
                "secret".into(),
                "key".into(),
                alias,
                format!("remote:{}", config.require("remote_key")?),
                "--force".into(),
            ],
            KeyImportMode::Ledger => vec![
                "import".into(),
                "secret".into(),
                "key".into(),
                alias,
                config.require("ledger_key")?.to_string(),
                "--force".into(),
            ],
            KeyImportMode::GenerateFreshKey => vec!["gen".into(), "keys".into(), alias, "--force".into()],
            KeyImportMode::Json => vec![
                "activate".into(),
                "account".into(),
                alias,
                "with".into(),
                config.require("json_filepath")?.to_string(),
                "--force".into(),
            ],
        };
        args.extend(tail);
        self.run("octez-client", &args)?;
        Ok(())
    }

    fn register_baker(&self, config: &WizardConfig) -> Result<()> {
        let mut args = client_options(config)?;
        args.extend([
            "register".into(),
            "key".into(),
            config.require("baker_alias")?.to_string(),
            "as".into(),
            "delegate".into(),
        ]);
        self.run("octez-client", &args)?;
        Ok(())
    }
}

/// `--base-dir`, `--endpoint` and, with a remote signer, `-R`
pub fn client_options(config: &WizardConfig) -> Result<Vec<String>> {
    let mut args = vec![
        "--base-dir".to_string(),
        config.require("client_data_dir")?.to_string(),
        "--endpoint".to_string(),
        config.require("node_rpc_endpoint")?.to_string(),
    ];
    if let Some(host) = config.get("remote_host") {
        args.push("-R".into());
        args.push(host.to_string());
    }
    Ok(args)
}

/// Public key hash from `octez-client show address` output
pub fn parse_key_hash(output: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"Hash: (tz[123]\w{33})").expect("static pattern compiles"));
    re.captures(output).map(|c| c[1].to_string())
}

/// Secret material never reaches the log.
fn redact(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|a| {
            if a.starts_with("unencrypted:") || a.starts_with("encrypted:") {
                "<secret key>".to_string()
            } else {
                a.clone()
            }
        })
        .collect()
}
