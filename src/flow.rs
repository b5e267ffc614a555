//! The full setup run
//!
//! [`SetupFlow`] strings the steps together: network and service choices,
//! node bootstrap with an optional snapshot import, then the baker key and
//! baking service. Side effects go through [`NodeBackend`] and
//! [`ServiceManager`]; the node service started here is registered with a
//! [`ServiceGuard`] so that any early exit stops it again.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::backend::{NodeBackend, SnapshotImport, SnapshotSource};
use crate::error::{Result, WizardError};
use crate::service_guard::{ServiceGuard, ServiceRegistry};
use crate::services::{baking_unit, node_unit, ServiceAction, ServiceManager};
use crate::snapshot::{CatalogProvider, HttpClient, SnapshotCatalog, SnapshotOffer};
use crate::steps;
use crate::types::{HistoryMode, KeyImportMode, Region, ServiceMode, Toggle};
use crate::version::NodeVersionSource;
use crate::wizard::{Prompter, Setup};

const WELCOME: &str = "Baking Setup Wizard

Welcome, this wizard will help you to set up the infrastructure to interact with the
Tezos blockchain.

In order to run a baking instance, you'll need the following Tezos binaries:
 octez-client, octez-node, octez-baker-<proto>
If you have installed the baking package, these binaries are already installed.

To access the help text for a question, type 'help' or '?'.
To quit the wizard, type 'quit' or 'exit'. Answers given so far are not applied.
";

/// Arguments that answer the snapshot import mode step
const SNAPSHOT_ARGS: &[&str] = &["snapshot_mode", "snapshot_file", "snapshot_url", "provider_url"];
/// Arguments that answer the key import mode step
const KEY_ARGS: &[&str] = &["key_import_mode", "secret_key", "remote_signer_uri", "ledger_url", "json_filepath"];

/// How a run that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// Node and baker are running
    Completed,
    /// Node-only setup finished after the node started
    NodeOnly,
}

/// Collaborators of a setup run
pub struct SetupFlow<P: Prompter> {
    setup: Setup<P>,
    services: Arc<dyn ServiceManager>,
    backend: Box<dyn NodeBackend>,
    catalog: SnapshotCatalog,
    client: Arc<dyn HttpClient>,
    versions: Arc<dyn NodeVersionSource>,
    registry: Arc<Mutex<ServiceRegistry>>,
}

impl<P: Prompter> SetupFlow<P> {
    pub fn new(
        setup: Setup<P>,
        services: Arc<dyn ServiceManager>,
        backend: Box<dyn NodeBackend>,
        client: Arc<dyn HttpClient>,
        versions: Arc<dyn NodeVersionSource>,
    ) -> Self {
        let catalog = SnapshotCatalog::defaults(client.clone(), versions.clone());
        Self {
            setup,
            services,
            backend,
            catalog,
            client,
            versions,
            registry: ServiceRegistry::global(),
        }
    }

    pub fn with_catalog(mut self, catalog: SnapshotCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Track started services in `registry` instead of the global one.
    pub fn with_registry(mut self, registry: Arc<Mutex<ServiceRegistry>>) -> Self {
        self.registry = registry;
        self
    }

    pub fn setup(&self) -> &Setup<P> {
        &self.setup
    }

    pub fn into_setup(self) -> Setup<P> {
        self.setup
    }

    /// Run the wizard. Services started on the way are stopped again unless
    /// the run succeeds.
    pub fn run(&mut self) -> Result<SetupOutcome> {
        let guard = ServiceGuard::with_registry(self.registry.clone(), self.services.clone());
        let outcome = self.run_steps(&guard)?;
        guard.release();
        Ok(outcome)
    }

    fn run_steps(&mut self, guard: &ServiceGuard) -> Result<SetupOutcome> {
        info!("Starting the setup wizard");
        self.setup.say(WELCOME);

        self.setup.query_step(&steps::network(self.services.clone()))?;
        self.setup.query_step(&steps::mode())?;
        self.setup.query_step(&steps::systemd_mode())?;

        self.setup.notice("Trying to bootstrap the node");
        self.bootstrap_node(guard)?;

        let mode: ServiceMode = self.setup.config().parsed("mode")?;
        if mode == ServiceMode::Node {
            let network = self.setup.config().require("network")?.to_string();
            self.setup.notice(
                "The node setup is finished. It will take some time for the node to bootstrap.\n\
                 You can check the progress by running the following command:",
            );
            self.setup.say(&format!("systemctl status {}", node_unit(&network)));
            return Ok(SetupOutcome::NodeOnly);
        }

        self.setup_baker()?;
        self.set_liquidity_toggle_vote()?;

        let network = self.setup.config().require("network")?.to_string();
        self.setup.notice("Starting the baking instance");
        self.services.run(ServiceAction::Restart, &baking_unit(&network))?;

        self.setup.say(&format!(
            "\nCongratulations! All required services should now be started.\n\
             To stop the baking instance, run:\n\
             sudo systemctl stop {}",
            baking_unit(&network)
        ));
        info!("Setup completed");
        Ok(SetupOutcome::Completed)
    }

    /// A failure the operator can recover from by answering again. When the
    /// answers come from automation input nothing would change on a retry,
    /// so it is fatal.
    fn recover(&mut self, err: WizardError, back_to: &str, answered_by: &[&str]) -> Result<()> {
        let automated =
            self.setup.non_interactive() || answered_by.iter().any(|id| self.setup.args().get(id).is_some());
        if err.is_recoverable() && !automated {
            error!(error = %err, "Step failed, returning to {}", back_to);
            self.setup.say(&format!("{}\n", err));
            self.setup.notice(&format!("Getting back to the {} step.", back_to));
            Ok(())
        } else {
            Err(err)
        }
    }

    // ========================================================================
    // Node
    // ========================================================================

    fn bootstrap_node(&mut self, guard: &ServiceGuard) -> Result<()> {
        if self.prepare_node_dir()? {
            self.setup.query_step(&steps::history_mode())?;
            info!("Updating history mode in the node config");
            self.backend.configure_node(self.setup.config())?;
            self.import_snapshot()?;
        }

        let network = self.setup.config().require("network")?.to_string();
        let unit = node_unit(&network);
        self.setup.notice(
            "Starting the node service. This is expected to take some time,\n\
             as the node needs a node identity to be generated.",
        );
        self.services.run(ServiceAction::Start, &unit)?;
        guard.started(&unit);

        self.setup.notice("Waiting for the node service to start...");
        let endpoint = self.setup.config().require("node_rpc_endpoint")?.to_string();
        self.backend.wait_for_node(&endpoint)?;
        self.setup.notice("Generated node identity and started the service.");

        let enable: Toggle = self.setup.config().parsed("systemd_mode")?;
        if enable.is_yes() {
            self.services.run(ServiceAction::Enable, &unit)?;
            if self.setup.config().parsed::<ServiceMode>("mode")? == ServiceMode::Baking {
                self.services.run(ServiceAction::Enable, &baking_unit(&network))?;
            }
        }
        Ok(())
    }

    /// Whether a snapshot should be imported: true for an empty node
    /// directory or after the operator agreed to clear it.
    fn prepare_node_dir(&mut self) -> Result<bool> {
        let node_dir = PathBuf::from(self.setup.config().require("node_data_dir")?);
        let data = self.backend.node_data(&node_dir)?;
        if data.is_empty() {
            return Ok(true);
        }

        info!(dir = %node_dir.display(), entries = data.len(), "Node directory already has blockchain data");
        let listing: Vec<String> = data.iter().map(|p| format!("- {}", p.display())).collect();
        self.setup.say(&format!(
            "The node data directory already has some blockchain data:\n{}",
            listing.join("\n")
        ));
        self.setup.query_step(&steps::delete_node_data())?;
        if !self.setup.config().parsed::<Toggle>("delete_node_data")?.is_yes() {
            return Ok(false);
        }

        let network = self.setup.config().require("network")?.to_string();
        self.setup.notice("Stopping node service");
        self.services.run(ServiceAction::Stop, &node_unit(&network))?;
        self.backend.clear_node_data(&data)?;
        self.setup.notice("Node directory cleaned.");
        Ok(true)
    }

    fn import_snapshot(&mut self) -> Result<()> {
        loop {
            let Some(source) = self.choose_snapshot()? else {
                info!("Skipping snapshot import");
                return Ok(());
            };

            let config = self.setup.config();
            let history_mode: HistoryMode = config.parsed("history_mode")?;
            let import = SnapshotImport {
                network: config.require("network")?.to_string(),
                source,
                reconstruct: history_mode == HistoryMode::Archive,
            };

            info!("Importing snapshot with the node");
            match self.backend.import_snapshot(&import) {
                Ok(()) => {
                    self.setup.notice("Snapshot imported.");
                    return Ok(());
                }
                Err(err) => self.recover(err, "snapshot import mode", SNAPSHOT_ARGS)?,
            }
        }
    }

    /// Ask for the snapshot source until one is usable. `None` means skip.
    fn choose_snapshot(&mut self) -> Result<Option<SnapshotSource>> {
        loop {
            let network = self.setup.config().require("network")?.to_string();
            let history_mode: HistoryMode = self.setup.config().parsed("history_mode")?;
            let region = if self.catalog.needs_region() {
                self.setup.ensure_step(&steps::region())?;
                Some(self.setup.config().parsed::<Region>("region")?)
            } else {
                None
            };

            self.setup.notice("Getting snapshots' metadata from the providers...");
            let offers = self.catalog.offers(&network, history_mode, region);
            let step = steps::snapshot_mode(
                history_mode,
                &offers,
                self.catalog.recommended(),
                self.client.clone(),
            );
            self.setup.query_step(&step)?;

            let choice = self.setup.config().require("snapshot_mode")?.to_string();
            let source = match choice.as_str() {
                steps::SNAPSHOT_SKIP => return Ok(None),
                steps::SNAPSHOT_FILE => {
                    let file = self.setup.config().require("snapshot_file")?;
                    Some(SnapshotSource::File(PathBuf::from(file)))
                }
                steps::SNAPSHOT_DIRECT_URL => {
                    self.setup.query_step(&steps::snapshot_sha256())?;
                    let config = self.setup.config();
                    Some(SnapshotSource::Url {
                        url: config.require("snapshot_url")?.to_string(),
                        sha256: config.get("snapshot_sha256").filter(|s| !s.is_empty()).map(str::to_string),
                    })
                }
                steps::SNAPSHOT_PROVIDER_URL => {
                    let url = self.setup.config().require("provider_url")?.to_string();
                    let provider = CatalogProvider::custom(&url, self.client.clone(), self.versions.clone());
                    SnapshotCatalog::lookup(&provider, &network, history_mode, region).map(|metadata| {
                        SnapshotSource::Provider(SnapshotOffer {
                            provider: url.clone(),
                            metadata,
                        })
                    })
                }
                download => offers
                    .into_iter()
                    .find(|o| steps::download_option(history_mode, &o.provider) == download)
                    .map(SnapshotSource::Provider),
            };

            match source {
                Some(SnapshotSource::Provider(offer)) => {
                    self.setup
                        .say(&format!("\nSnapshot metadata:\n{}\n", offer.metadata));
                    return Ok(Some(SnapshotSource::Provider(offer)));
                }
                Some(source) => return Ok(Some(source)),
                None => {
                    warn!(%choice, "No usable snapshot for the chosen option");
                    self.recover(
                        WizardError::external("Couldn't find an available snapshot for this option."),
                        "snapshot import mode",
                        SNAPSHOT_ARGS,
                    )?;
                }
            }
        }
    }

    // ========================================================================
    // Baker
    // ========================================================================

    fn setup_baker(&mut self) -> Result<()> {
        loop {
            self.setup.say("");
            self.setup.notice("Importing the baker key");
            let attempt = self.import_baker_key().and_then(|()| self.register_baker());
            match attempt {
                Ok(()) => return Ok(()),
                Err(err) => self.recover(err, "key import mode", KEY_ARGS)?,
            }
        }
    }

    /// Import a baker key unless one exists and the operator keeps it.
    fn import_baker_key(&mut self) -> Result<()> {
        if let Some(address) = self.backend.baker_key(self.setup.config())? {
            let alias = self.setup.config().require("baker_alias")?.to_string();
            self.setup
                .notice(&format!("An account with the '{}' alias already exists.", alias));
            self.setup.say(&format!("Its current address is {}", address));
            self.setup.query_step(&steps::replace_key())?;
            if !self.setup.config().parsed::<Toggle>("replace_key")?.is_yes() {
                return Ok(());
            }
        }

        let network = self.setup.config().require("network")?.to_string();
        self.setup.query_step(&steps::key_import_mode(&network))?;
        let mode: KeyImportMode = self.setup.config().parsed("key_import_mode")?;

        if mode == KeyImportMode::Ledger && !self.setup.config().contains("ledger_key") {
            self.setup.query_step(&steps::derivation_path())?;
            let config = self.setup.config();
            let key = steps::ledger_key(config.require("ledger_url")?, config.require("derivation_path")?);
            self.setup.config_mut().set("ledger_key", key);
        }
        if mode == KeyImportMode::Ledger {
            self.setup
                .say("Waiting for your response to the prompt on your Ledger Device...");
        }

        info!(%mode, "Importing baker key");
        self.backend.import_key(self.setup.config())?;
        if mode == KeyImportMode::GenerateFreshKey {
            self.setup.say(
                "Before registering the baker you'll need to provide the new address with some tez.",
            );
        }
        Ok(())
    }

    fn register_baker(&mut self) -> Result<()> {
        let hash = self
            .backend
            .baker_key(self.setup.config())?
            .ok_or_else(|| WizardError::external("the baker key was not found after import"))?;
        self.setup.config_mut().set("baker_key_hash", hash.clone());

        self.setup.notice("Registering the baker");
        self.backend.register_baker(self.setup.config())?;
        self.setup.say(&format!(
            "You can check a blockchain explorer (e.g. https://tzkt.io/{})\n\
             to see the baker status and baking rights of your account.",
            hash
        ));
        Ok(())
    }

    /// The vote is read from the environment on every start, so it is written
    /// on each run.
    fn set_liquidity_toggle_vote(&mut self) -> Result<()> {
        self.setup.query_step(&steps::liquidity_toggle_vote())?;
        let config = self.setup.config();
        let network = config.require("network")?;
        let vote = config.require("liquidity_toggle_vote")?;
        info!(vote, "Writing liquidity baking toggle vote to the baking service environment");
        self.services.set_environment(
            &baking_unit(network),
            "LIQUIDITY_BAKING_TOGGLE_VOTE",
            &format!("\"{}\"", vote),
        )
    }
}
