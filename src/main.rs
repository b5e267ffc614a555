//! Baking Setup - Main entry point
//!
//! Parses the command line, sets up logging and signal handling, and runs
//! either the setup wizard or the snapshot lookup.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use baking_setup::backend::CommandBackend;
use baking_setup::cli::{Cli, Commands, SetupArgs};
use baking_setup::config_file::AnswersFile;
use baking_setup::error::WizardError;
use baking_setup::flow::{SetupFlow, SetupOutcome};
use baking_setup::services::{ServiceManager, Systemctl};
use baking_setup::snapshot::{CatalogProvider, HttpClient, ReqwestClient, SnapshotCatalog, SnapshotOffer};
use baking_setup::types::{HistoryMode, Region};
use baking_setup::version::{CommandVersionSource, NodeVersionSource};
use baking_setup::wizard::{Setup, TerminalPrompter};
use baking_setup::{logging, service_guard};

fn main() {
    let cli = Cli::parse_args();

    let log_path = match logging::init() {
        Ok(path) => Some(path),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        }
    };
    info!("Baking setup starting up");

    if let Err(e) = service_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    debug!("Signal handlers initialized");

    let result = match cli.command {
        Some(Commands::Snapshot {
            network,
            history_mode,
            provider,
            provider_url,
            region,
        }) => run_snapshot_lookup(&network, history_mode, provider, provider_url, region),
        None => run_setup(&cli.setup, cli.dry_run),
    };

    // The service guard inside the flow has been dropped by now, so anything
    // it had to stop is stopped before exiting.
    if let Err(err) = result {
        report(&err, log_path.as_deref());
        std::process::exit(1);
    }
}

fn report(err: &anyhow::Error, log_path: Option<&Path>) {
    match err.downcast_ref::<WizardError>() {
        Some(WizardError::Cancelled(reason)) => {
            info!(%reason, "Setup cancelled");
            println!();
            println!("Exiting the setup wizard.");
        }
        _ => {
            error!("Setup failed: {:#}", err);
            for cause in err.chain().skip(1) {
                error!("  caused by: {}", cause);
            }
            eprintln!("Error: {:#}", err);
            if let Some(path) = log_path {
                eprintln!("See {} for details.", path.display());
            }
        }
    }
}

fn run_setup(args: &SetupArgs, dry_run: bool) -> Result<()> {
    let mut input = args.to_automation_input();
    if let Some(path) = &args.answers {
        info!("Loading answers from: {:?}", path);
        let answers = AnswersFile::load_from_file(path)?;
        input.merge_missing(answers.answers);
    }
    if dry_run {
        info!("Dry-run mode: changes are logged instead of applied");
        println!("Dry-run mode: no changes will be made to this machine.\n");
    }

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new().context("Failed to build HTTP client")?);
    let versions: Arc<dyn NodeVersionSource> = Arc::new(CommandVersionSource::default());
    let services: Arc<dyn ServiceManager> = Arc::new(Systemctl::new(dry_run));
    let backend = Box::new(CommandBackend::new(client.clone(), dry_run));

    let setup = Setup::new(input, TerminalPrompter);
    let mut flow = SetupFlow::new(setup, services, backend, client, versions);
    let outcome = flow.run()?;
    info!(?outcome, "Setup finished");

    if let Some(path) = &args.save_answers {
        save_answers(flow.setup().config(), path)?;
    }

    if outcome == SetupOutcome::NodeOnly {
        debug!("Node-only setup, baker steps skipped");
    }
    println!();
    println!("Exiting the setup wizard.");
    Ok(())
}

fn save_answers(config: &baking_setup::config::WizardConfig, path: &Path) -> Result<()> {
    AnswersFile::from_config(config).save_to_file(path)?;
    info!("Answers saved to {:?}", path);
    println!("Answers saved to {}", path.display());
    Ok(())
}

fn run_snapshot_lookup(
    network: &str,
    history_mode: HistoryMode,
    provider: Option<String>,
    provider_url: Option<String>,
    region: Region,
) -> Result<()> {
    let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new().context("Failed to build HTTP client")?);
    let versions: Arc<dyn NodeVersionSource> = Arc::new(CommandVersionSource::default());

    let offer = match provider_url {
        Some(url) => {
            let custom = CatalogProvider::custom(&url, client, versions);
            SnapshotCatalog::lookup(&custom, network, history_mode, Some(region))
                .map(|metadata| SnapshotOffer { provider: url, metadata })
        }
        None => {
            let catalog = SnapshotCatalog::defaults(client, versions);
            let preferred = provider
                .or_else(|| catalog.recommended().map(str::to_string))
                .unwrap_or_default();
            if catalog.get(&preferred).is_none() {
                let known: Vec<&str> = catalog.providers().iter().map(|p| p.title()).collect();
                anyhow::bail!("Unknown provider '{}', expected one of: {}", preferred, known.join(", "));
            }
            catalog.find_with_fallback(&preferred, network, history_mode, Some(region))
        }
    };

    match offer {
        Some(offer) => {
            println!("Provider: {}", offer.provider);
            println!("{}", offer.metadata);
            Ok(())
        }
        None => Err(WizardError::provider(format!(
            "No compatible {} snapshot found for {}",
            history_mode, network
        ))
        .into()),
    }
}
