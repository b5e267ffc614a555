use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AutomationInput;
use crate::types::{HistoryMode, KeyImportMode, Region, ServiceMode, Toggle, ToggleVote};

/// Baking Setup - set up a node and baker step by step
#[derive(Parser)]
#[command(name = "baking-setup")]
#[command(about = "Interactive setup wizard for a node and baking services")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: show what would be executed without making changes.
    ///
    /// In this mode, service changes, data removal, snapshot imports and key
    /// imports are skipped and logged. Read-only queries (service
    /// environments, node version, snapshot metadata) still run so the
    /// answers offered are realistic.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(flatten)]
    pub setup: SetupArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find the best snapshot for the local node and print it
    Snapshot {
        #[arg(long)]
        network: String,

        #[arg(long, default_value_t = HistoryMode::Rolling)]
        history_mode: HistoryMode,

        /// Provider to ask first (defaults to the recommended one)
        #[arg(long)]
        provider: Option<String>,

        /// Custom catalog provider URL, asked instead of the known providers
        #[arg(long)]
        provider_url: Option<String>,

        /// Mirror region for providers that have them
        #[arg(long, default_value_t = Region::Eu)]
        region: Region,
    },
}

/// Pre-answers for wizard steps
#[derive(Args, Debug, Default, Clone)]
pub struct SetupArgs {
    /// Fail on any question that has no answer instead of prompting
    #[arg(short = 'n', long)]
    pub non_interactive: bool,

    /// JSON file with pre-answered steps; explicit flags take precedence
    #[arg(long)]
    pub answers: Option<PathBuf>,

    /// Write the final answers to this JSON file after the run
    #[arg(long)]
    pub save_answers: Option<PathBuf>,

    #[arg(long)]
    pub network: Option<String>,

    #[arg(long)]
    pub mode: Option<ServiceMode>,

    /// Enable the services so they start on boot
    #[arg(long)]
    pub enable: Option<Toggle>,

    #[arg(long)]
    pub history_mode: Option<HistoryMode>,

    /// e.g. "file", "direct url", "provider url", "skip" or "download rolling (tzinit)"
    #[arg(long)]
    pub snapshot_mode: Option<String>,

    /// Snapshot file to import
    #[arg(long)]
    pub file: Option<String>,

    /// Direct snapshot URL to import
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub provider_url: Option<String>,

    /// Checksum of the snapshot given with --url
    #[arg(long)]
    pub sha256: Option<String>,

    #[arg(long)]
    pub region: Option<Region>,

    /// Delete existing blockchain data in the node directory
    #[arg(long)]
    pub overwrite_node_dir: Option<Toggle>,

    /// Replace an existing baker key
    #[arg(long)]
    pub replace_baker_key: Option<Toggle>,

    #[arg(long)]
    pub key_import_mode: Option<KeyImportMode>,

    #[arg(long)]
    pub secret_key: Option<String>,

    #[arg(long)]
    pub remote_signer_uri: Option<String>,

    #[arg(long)]
    pub ledger_url: Option<String>,

    #[arg(long)]
    pub derivation_path: Option<String>,

    #[arg(long)]
    pub json_filepath: Option<String>,

    #[arg(long)]
    pub liquidity_toggle_vote: Option<ToggleVote>,
}

impl SetupArgs {
    /// Flags keyed by the step they answer
    pub fn to_automation_input(&self) -> AutomationInput {
        let mut input = AutomationInput::new(self.non_interactive);
        let pairs: [(&str, Option<String>); 19] = [
            ("network", self.network.clone()),
            ("mode", self.mode.map(|v| v.to_string())),
            ("systemd_mode", self.enable.map(|v| v.to_string())),
            ("history_mode", self.history_mode.map(|v| v.to_string())),
            ("snapshot_mode", self.snapshot_mode.clone()),
            ("snapshot_file", self.file.clone()),
            ("snapshot_url", self.url.clone()),
            ("provider_url", self.provider_url.clone()),
            ("snapshot_sha256", self.sha256.clone()),
            ("region", self.region.map(|v| v.to_string())),
            ("delete_node_data", self.overwrite_node_dir.map(|v| v.to_string())),
            ("replace_key", self.replace_baker_key.map(|v| v.to_string())),
            ("key_import_mode", self.key_import_mode.map(|v| v.to_string())),
            ("secret_key", self.secret_key.clone()),
            ("remote_signer_uri", self.remote_signer_uri.clone()),
            ("ledger_url", self.ledger_url.clone()),
            ("derivation_path", self.derivation_path.clone()),
            ("json_filepath", self.json_filepath.clone()),
            ("liquidity_toggle_vote", self.liquidity_toggle_vote.map(|v| v.to_string())),
        ];
        for (step, value) in pairs {
            if let Some(value) = value {
                input.insert(step, value);
            }
        }
        input
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_no_arguments() {
        let cli = Cli::try_parse_from(["baking-setup"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.dry_run);
        assert!(cli.setup.to_automation_input().is_empty());
    }

    #[test]
    fn test_cli_setup_flags_map_to_steps() {
        let cli = Cli::try_parse_from([
            "baking-setup",
            "--network",
            "ghostnet",
            "--mode",
            "node",
            "--enable",
            "yes",
            "--file",
            "/tmp/snap",
            "--overwrite-node-dir",
            "no",
            "-n",
        ])
        .unwrap();
        let input = cli.setup.to_automation_input();
        assert!(input.non_interactive());
        assert_eq!(input.get("network"), Some("ghostnet"));
        assert_eq!(input.get("mode"), Some("node"));
        assert_eq!(input.get("systemd_mode"), Some("yes"));
        assert_eq!(input.get("snapshot_file"), Some("/tmp/snap"));
        assert_eq!(input.get("delete_node_data"), Some("no"));
        assert_eq!(input.len(), 5);
    }

    #[test]
    fn test_cli_rejects_unknown_enum_value() {
        assert!(Cli::try_parse_from(["baking-setup", "--history-mode", "experimental"]).is_err());
        assert!(Cli::try_parse_from(["baking-setup", "--key-import-mode", "usb"]).is_err());
    }

    #[test]
    fn test_cli_snapshot_command() {
        let cli = Cli::try_parse_from([
            "baking-setup",
            "--dry-run",
            "snapshot",
            "--network",
            "mainnet",
            "--history-mode",
            "full",
        ])
        .unwrap();
        assert!(cli.dry_run);
        match cli.command {
            Some(Commands::Snapshot {
                network,
                history_mode,
                provider,
                ..
            }) => {
                assert_eq!(network, "mainnet");
                assert_eq!(history_mode, HistoryMode::Full);
                assert!(provider.is_none());
            }
            _ => panic!("Expected Snapshot command"),
        }
    }
}
