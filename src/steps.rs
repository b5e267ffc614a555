//! The questions the setup wizard asks
//!
//! Each function builds one [`Step`]. Steps that depend on run state (the
//! snapshot offers, the chosen network) are built when they are needed.

use regex::Regex;
use std::sync::{Arc, OnceLock};

use strum::IntoEnumIterator;
use tracing::{debug, warn};

use crate::config::WizardConfig;
use crate::error::ValidationError;
use crate::services::{baking_unit, node_unit, ServiceManager};
use crate::snapshot::{HttpClient, SnapshotOffer};
use crate::types::{HistoryMode, KeyImportMode, Region, ServiceMode, ToggleVote, DEFAULT_NETWORKS};
use crate::wizard::validators::{ledger_regex, signer_uri_regex};
use crate::wizard::{OptionEntry, Step, StepOptions, Validator};

/// Every step id that can be pre-answered from the command line or an answers file
pub const KNOWN_STEP_IDS: &[&str] = &[
    "network",
    "mode",
    "systemd_mode",
    "history_mode",
    "delete_node_data",
    "snapshot_mode",
    "snapshot_file",
    "snapshot_url",
    "provider_url",
    "snapshot_sha256",
    "region",
    "replace_key",
    "key_import_mode",
    "secret_key",
    "remote_signer_uri",
    "ledger_url",
    "derivation_path",
    "json_filepath",
    "liquidity_toggle_vote",
];

/// Steps whose answers are key material and stay out of saved answers
pub const SECRET_STEP_IDS: &[&str] = &["secret_key"];

pub const DEFAULT_CLIENT_DIR: &str = "/var/lib/tezos/.tezos-client";
pub const DEFAULT_RPC_ADDR: &str = "localhost:8732";
pub const DEFAULT_BAKER_ALIAS: &str = "baker";

/// Snapshot mode keys that are not tied to a provider
pub const SNAPSHOT_FILE: &str = "file";
pub const SNAPSHOT_DIRECT_URL: &str = "direct url";
pub const SNAPSHOT_PROVIDER_URL: &str = "provider url";
pub const SNAPSHOT_SKIP: &str = "skip";

pub fn default_node_dir(network: &str) -> String {
    format!("/var/lib/tezos/node-{}", network)
}

fn yes_no(yes: &str, no: &str) -> StepOptions {
    StepOptions::described([("no", no), ("yes", yes)])
}

// ============================================================================
// Network and services
// ============================================================================

/// Network choice. Answering it reads the baking and node unit environments
/// to fill in the client directory, RPC address and baker alias.
pub fn network(services: Arc<dyn ServiceManager>) -> Step {
    Step::choice(
        "network",
        "Which network would you like to use?\nCurrently supported:",
        StepOptions::labels(DEFAULT_NETWORKS.iter().copied()),
    )
    .help(
        "The selected network will be used to set up all required services.\n\
         Keep in mind that you must select a test network (e.g. ghostnet)\n\
         if you plan on baking with a faucet JSON file.",
    )
    .action(move |network, config| {
        fill_service_config(services.as_ref(), network, config);
        Ok(())
    })
}

/// Derived fields from the unit environments. Units that cannot be read
/// leave the defaults in place.
pub fn fill_service_config(services: &dyn ServiceManager, network: &str, config: &mut WizardConfig) {
    let baking_env = services.environment(&baking_unit(network)).unwrap_or_else(|e| {
        warn!(network, error = %e, "Could not read the baking service environment");
        Default::default()
    });
    let node_env = services.environment(&node_unit(network)).unwrap_or_else(|e| {
        debug!(network, error = %e, "Could not read the node service environment");
        Default::default()
    });

    let get = |env: &std::collections::HashMap<String, String>, key: &str, default: String| {
        env.get(key).filter(|v| !v.is_empty()).cloned().unwrap_or(default)
    };

    let rpc_addr = get(&baking_env, "NODE_RPC_ADDR", DEFAULT_RPC_ADDR.to_string());
    config.set("client_data_dir", get(&baking_env, "TEZOS_CLIENT_DIR", DEFAULT_CLIENT_DIR.to_string()));
    config.set("node_rpc_endpoint", format!("http://{}", rpc_addr));
    config.set("node_rpc_addr", rpc_addr);
    config.set("baker_alias", get(&baking_env, "BAKER_ADDRESS_ALIAS", DEFAULT_BAKER_ALIAS.to_string()));
    config.set("node_data_dir", get(&node_env, "TEZOS_NODE_DIR", default_node_dir(network)));
}

pub fn mode() -> Step {
    Step::choice(
        "mode",
        "Do you want to set up baking or to run the standalone node?",
        StepOptions::described(ServiceMode::iter().map(|m| (m.to_string(), m.description()))),
    )
    .help(
        "By default, predefined services for running a baker on the chosen network are set up.\n\
         Sometimes, however, you might want to only run the node.\n\
         When this option is chosen, this wizard will help you bootstrap the node only.",
    )
}

pub fn systemd_mode() -> Step {
    Step::choice(
        "systemd_mode",
        "Would you like your setup to automatically start on boot?",
        yes_no(
            "Enable the services, running them both now and on every boot",
            "Start the services this time only",
        ),
    )
    .help(
        "Starting the service will make it available just for this session, great\n\
         if you want to experiment. Enabling it will make it start on every boot.",
    )
}

pub fn liquidity_toggle_vote() -> Step {
    Step::choice(
        "liquidity_toggle_vote",
        "Would you like to request to end the Liquidity Baking subsidy?",
        StepOptions::described(ToggleVote::iter().map(|v| (v.to_string(), v.description()))),
    )
    .help(
        "The chain offers a Liquidity Baking subsidy mechanism to incentivise exchange\n\
         between tez and tzBTC. You can ask to end this subsidy, ask to continue it, or abstain.",
    )
}

// ============================================================================
// Node data and snapshots
// ============================================================================

pub fn history_mode() -> Step {
    Step::choice(
        "history_mode",
        "Which history mode do you want your node to run in?",
        StepOptions::described(HistoryMode::iter().map(|m| (m.to_string(), m.description()))),
    )
    .help(
        "History modes govern how much data a node stores, and, consequently, how much disk\n\
         space is required. Rolling mode is the smallest and fastest but still sufficient for baking.",
    )
    .default_answer("1")
}

pub fn delete_node_data() -> Step {
    Step::choice(
        "delete_node_data",
        "Delete this data and bootstrap the node again?",
        yes_no(
            "Remove the data under the node data directory",
            "Keep the existing data",
        ),
    )
    .help(
        "It's possible to proceed with bootstrapping the node using\n\
         the existing blockchain data, instead of importing a fresh snapshot.",
    )
}

pub fn region() -> Step {
    Step::choice(
        "region",
        "Choose the snapshot service closest to your servers:",
        StepOptions::described(Region::iter().map(|r| (r.to_string(), r.description()))),
    )
    .help(
        "Snapshot download can take significant time to finish.\n\
         Choosing the correct region will provide you better download speed.",
    )
    .default_answer("1")
}

/// Option key of a provider download
pub fn download_option(history_mode: HistoryMode, provider: &str) -> String {
    format!("download {} ({})", history_mode, provider)
}

/// Snapshot import choice, offering a download only from providers that
/// currently have a compatible snapshot. The first offer is the default;
/// without offers the default is to skip the import.
pub fn snapshot_mode(
    history_mode: HistoryMode,
    offers: &[SnapshotOffer],
    recommended: Option<&str>,
    client: Arc<dyn HttpClient>,
) -> Step {
    let mut entries: Vec<(String, OptionEntry)> = offers
        .iter()
        .map(|offer| {
            let mut description = format!("Import {} snapshot from {}", history_mode, offer.provider);
            if recommended == Some(offer.provider.as_str()) {
                description.push_str(" (recommended)");
            }
            (download_option(history_mode, &offer.provider), OptionEntry::Description(description))
        })
        .collect();
    entries.push((
        SNAPSHOT_FILE.into(),
        OptionEntry::requires("Import snapshot from a file", snapshot_file()),
    ));
    entries.push((
        SNAPSHOT_DIRECT_URL.into(),
        OptionEntry::requires("Import snapshot from a direct url", snapshot_url(client.clone())),
    ));
    entries.push((
        SNAPSHOT_PROVIDER_URL.into(),
        OptionEntry::requires("Import snapshot from a provider", provider_url(client)),
    ));
    entries.push((
        SNAPSHOT_SKIP.into(),
        OptionEntry::Description(
            "Skip snapshot import and synchronize with the network from scratch".into(),
        ),
    ));
    let default = if offers.is_empty() { entries.len() } else { 1 };

    Step::choice(
        "snapshot_mode",
        "The node can take a significant time to bootstrap from scratch.\n\
         Bootstrapping from a snapshot is suggested instead.\n\
         How would you like to proceed?",
        StepOptions::Map(entries),
    )
    .help(
        "A fully-synced local node is required for running a baker.\n\
         By default, the node service will bootstrap from scratch,\n\
         which takes a significant amount of time. In order to avoid this, we suggest\n\
         bootstrapping from a snapshot instead. Rolling snapshots are the smallest\n\
         and the fastest, and sufficient for baking.",
    )
    .default_answer(default.to_string())
}

pub fn snapshot_file() -> Step {
    Step::new("snapshot_file", "Provide the path to the node snapshot file.")
        .help("You have indicated wanting to import the snapshot from a file.")
        .validator(Validator::sequence(vec![Validator::required(), Validator::filepath()]))
}

pub fn snapshot_url(client: Arc<dyn HttpClient>) -> Step {
    Step::new("snapshot_url", "Provide the url of the node snapshot file.")
        .help("You have indicated wanting to import the snapshot from a custom url.")
        .validator(Validator::sequence(vec![
            Validator::required(),
            Validator::reachable_url(client, None),
        ]))
}

pub fn provider_url(client: Arc<dyn HttpClient>) -> Step {
    Step::new("provider_url", "Provide the url of the snapshot provider.")
        .help("You have indicated wanting to fetch the snapshot from a custom provider.")
        .validator(Validator::sequence(vec![
            Validator::required(),
            Validator::reachable_url(client, None),
        ]))
}

/// Optional checksum; an empty answer skips the integrity check.
pub fn snapshot_sha256() -> Step {
    Step::new(
        "snapshot_sha256",
        "Provide the sha256 of the node snapshot file. (optional)",
    )
    .help("With sha256 provided, an integrity check will be performed for you.")
    .default_answer("")
    .validator(Validator::new(|input| {
        let input = input.trim();
        if input.is_empty() || (input.len() == 64 && input.chars().all(|c| c.is_ascii_hexdigit())) {
            Ok(input.to_lowercase())
        } else {
            Err(ValidationError::new("Please input a sha256 hash: 64 hexadecimal characters."))
        }
    }))
}

// ============================================================================
// Baker key
// ============================================================================

pub fn replace_key() -> Step {
    Step::choice(
        "replace_key",
        "Would you like to import a new key and replace this one?",
        yes_no("Import a key and use it as the baker key", "Use the existing key"),
    )
    .help(
        "It's possible to proceed with the existing baker key, instead of\n\
         importing a new one.",
    )
}

/// Key import choice. Faucet files and fresh keys are test-network only and
/// are removed on mainnet.
pub fn key_import_mode(network: &str) -> Step {
    let entry = |mode: KeyImportMode| -> (String, OptionEntry) {
        let key = mode.to_string();
        let entry = match mode {
            KeyImportMode::Ledger => OptionEntry::requires("From a ledger", ledger_url()),
            KeyImportMode::SecretKey => OptionEntry::requires(
                "Either the unencrypted or password-encrypted secret key for your address",
                secret_key(),
            ),
            KeyImportMode::Remote => OptionEntry::requires(
                "Remote key governed by a signer running on a different machine",
                remote_signer_uri(),
            ),
            KeyImportMode::GenerateFreshKey => {
                OptionEntry::Description("Generate fresh key that should be filled manually later".into())
            }
            KeyImportMode::Json => OptionEntry::requires("Faucet JSON file", json_filepath()),
        };
        (key, entry)
    };

    let step = Step::choice(
        "key_import_mode",
        "How do you want to import the baker key?",
        StepOptions::Map(KeyImportMode::iter().map(entry).collect()),
    )
    .help(
        "To register the baker, its secret key needs to be imported to the data\n\
         directory first. By default the baking service uses the 'baker' alias\n\
         for the key that will be used for baking and attesting.",
    );

    if network == "mainnet" {
        let pruned: Vec<String> = KeyImportMode::iter()
            .filter(|m| m.test_networks_only())
            .map(|m| m.to_string())
            .collect();
        let pruned: Vec<&str> = pruned.iter().map(String::as_str).collect();
        step.without_options(&pruned)
    } else {
        step
    }
}

pub fn secret_key() -> Step {
    Step::new("secret_key", "Provide either the unencrypted or password-encrypted secret key for your address.")
        .help("The format is 'unencrypted:edsk...' for the unencrypted key, or 'encrypted:edesk...' for the encrypted key.")
        .validator(Validator::sequence(vec![Validator::required(), Validator::secret_key()]))
}

/// Remote signer URI. Answering it splits the URI into signer host and key.
pub fn remote_signer_uri() -> Step {
    Step::new("remote_signer_uri", "Provide your remote key with the address of the signer.")
        .help(
            "The format is the address of your remote signer host, followed by a public key,\n\
             i.e. something like http://127.0.0.1:6732/tz1V8fDHpHzN8RrZqiYCHaJM9EocsYZch5Cy",
        )
        .validator(Validator::sequence(vec![Validator::required(), Validator::signer_uri()]))
        .action(|uri, config| {
            if let Some(caps) = signer_uri_regex().captures(uri) {
                config.set("remote_host", &caps[1]);
                config.set("remote_key", &caps[2]);
            }
            Ok(())
        })
}

/// Ledger device URL, either complete with curve and derivation path or the
/// bare device URL, in which case `derivation_path` is asked as well.
pub fn ledger_url() -> Step {
    Step::new("ledger_url", "Provide the ledger URL of the baker key.")
        .help(
            "The full format is ledger://<device>/<curve>/<path>, e.g.\n\
             ledger://reckless-tiger-fancy-shrimp/ed25519/0h/1h\n\
             With only ledger://<device>, you will be asked for the derivation path.",
        )
        .validator(Validator::sequence(vec![
            Validator::required(),
            Validator::new(|input| {
                let input = input.trim();
                if ledger_regex().is_match(input) || ledger_device_regex().is_match(input) {
                    Ok(input.trim_end_matches('/').to_string())
                } else {
                    Err(ValidationError::new(
                        "The input doesn't match the format for a ledger URL: ledger://<device>[/<curve>/<path>]\n\
                         Please check the input and try again.",
                    ))
                }
            }),
        ]))
        .action(|url, config| {
            if ledger_regex().is_match(url) {
                config.set("ledger_key", url);
            } else {
                config.remove("ledger_key");
            }
            Ok(())
        })
}

pub fn derivation_path() -> Step {
    Step::new("derivation_path", "Provide derivation path for the key stored on the ledger.")
        .help("The format is '[0-9]+h/[0-9]+h'")
        .validator(Validator::sequence(vec![Validator::required(), Validator::derivation_path()]))
}

/// Complete ledger key from a bare device URL and a derivation path
pub fn ledger_key(device_url: &str, derivation_path: &str) -> String {
    format!("{}/ed25519/{}", device_url.trim_end_matches('/'), derivation_path)
}

fn ledger_device_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^ledger://[\w\-]+/?$").expect("static pattern compiles"))
}

pub fn json_filepath() -> Step {
    Step::new("json_filepath", "Provide the path to your downloaded faucet JSON file.")
        .help("The file should contain the 'mnemonic' and 'secret' fields.")
        .validator(Validator::sequence(vec![Validator::required(), Validator::filepath()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::services::ServiceAction;
    use crate::snapshot::http::tests::MockHttpClient;
    use crate::snapshot::SnapshotMetadata;
    use std::collections::HashMap;

    struct EnvServices(HashMap<String, HashMap<String, String>>);

    impl ServiceManager for EnvServices {
        fn environment(&self, unit: &str) -> Result<HashMap<String, String>> {
            self.0
                .get(unit)
                .cloned()
                .ok_or_else(|| crate::error::WizardError::external(format!("no unit {}", unit)))
        }

        fn run(&self, _action: ServiceAction, _unit: &str) -> Result<()> {
            Ok(())
        }

        fn set_environment(&self, _unit: &str, _key: &str, _value: &str) -> Result<()> {
            Ok(())
        }
    }

    fn offer(provider: &str) -> SnapshotOffer {
        SnapshotOffer {
            provider: provider.into(),
            metadata: SnapshotMetadata {
                chain_name: "mainnet".into(),
                history_mode: "rolling".into(),
                block_height: 1,
                block_hash: None,
                block_timestamp: None,
                url: "https://x".into(),
                sha256: None,
                filesize: None,
                node_version: None,
                snapshot_version: Some(7),
            },
        }
    }

    #[test]
    fn test_network_fills_service_config() {
        let mut env = HashMap::new();
        env.insert(
            baking_unit("ghostnet"),
            HashMap::from([
                ("NODE_RPC_ADDR".to_string(), "127.0.0.1:8733".to_string()),
                ("BAKER_ADDRESS_ALIAS".to_string(), "alice".to_string()),
            ]),
        );
        let step = network(Arc::new(EnvServices(env)));
        let mut config = WizardConfig::new();
        let value = step.validate("2").unwrap();
        step.apply(&value, &mut config).unwrap();

        assert_eq!(config.get("network"), Some("ghostnet"));
        assert_eq!(config.get("node_rpc_endpoint"), Some("http://127.0.0.1:8733"));
        assert_eq!(config.get("baker_alias"), Some("alice"));
        assert_eq!(config.get("client_data_dir"), Some(DEFAULT_CLIENT_DIR));
        assert_eq!(config.get("node_data_dir"), Some("/var/lib/tezos/node-ghostnet"));
    }

    #[test]
    fn test_key_import_mode_pruned_on_mainnet() {
        let mainnet = key_import_mode("mainnet").options.choices();
        assert_eq!(mainnet, vec!["ledger", "secret-key", "remote"]);
        assert!(key_import_mode("mainnet").validate("json").is_err());
        assert_eq!(key_import_mode("ghostnet").options.choices().len(), 5);
    }

    #[test]
    fn test_snapshot_mode_offers() {
        let client: Arc<dyn HttpClient> = Arc::new(MockHttpClient::default());
        let step = snapshot_mode(
            HistoryMode::Rolling,
            &[offer("tzinit"), offer("xtz-shots.io")],
            Some("tzinit"),
            client.clone(),
        );
        let choices = step.options.choices();
        assert_eq!(choices[0], "download rolling (tzinit)");
        assert_eq!(choices.len(), 6);
        assert_eq!(step.validate("1").unwrap(), "download rolling (tzinit)");
        assert_eq!(step.options.requirements().count(), 3);
        assert!(step.render_options().contains("(recommended)"));

        let empty = snapshot_mode(HistoryMode::Full, &[], None, client);
        assert_eq!(empty.validate(empty.default.as_deref().unwrap()).unwrap(), SNAPSHOT_SKIP);
    }

    #[test]
    fn test_remote_signer_uri_action() {
        let step = remote_signer_uri();
        let uri = format!("tcp://10.0.0.1:7732/tz1{}", "a".repeat(33));
        let value = step.validate(&uri).unwrap();
        let mut config = WizardConfig::new();
        step.apply(&value, &mut config).unwrap();
        assert_eq!(config.get("remote_host"), Some("tcp://10.0.0.1:7732"));
        assert_eq!(config.get("remote_key"), Some(format!("tz1{}", "a".repeat(33)).as_str()));
    }

    #[test]
    fn test_ledger_url_forms() {
        let step = ledger_url();
        let mut config = WizardConfig::new();
        let full = step.validate("ledger://tiger-shrimp/ed25519/0h/1h").unwrap();
        step.apply(&full, &mut config).unwrap();
        assert_eq!(config.get("ledger_key"), Some("ledger://tiger-shrimp/ed25519/0h/1h"));

        let mut config = WizardConfig::new();
        let bare = step.validate("ledger://tiger-shrimp/").unwrap();
        step.apply(&bare, &mut config).unwrap();
        assert_eq!(config.get("ledger_key"), None);
        assert_eq!(ledger_key(&bare, "0h/1h"), "ledger://tiger-shrimp/ed25519/0h/1h");

        assert!(step.validate("usb://device").is_err());
    }

    #[test]
    fn test_sha256_optional() {
        let step = snapshot_sha256();
        assert_eq!(step.validate("").unwrap(), "");
        assert_eq!(step.validate(&"AB".repeat(32)).unwrap(), "ab".repeat(32));
        assert!(step.validate("abc").is_err());
    }

    #[test]
    fn test_known_step_ids_cover_catalog() {
        let client: Arc<dyn HttpClient> = Arc::new(MockHttpClient::default());
        let ids = [
            mode().id,
            systemd_mode().id,
            history_mode().id,
            delete_node_data().id,
            snapshot_mode(HistoryMode::Rolling, &[], None, client.clone()).id,
            snapshot_file().id,
            snapshot_url(client.clone()).id,
            provider_url(client).id,
            snapshot_sha256().id,
            region().id,
            replace_key().id,
            key_import_mode("ghostnet").id,
            secret_key().id,
            remote_signer_uri().id,
            ledger_url().id,
            derivation_path().id,
            json_filepath().id,
            liquidity_toggle_vote().id,
        ];
        for id in ids {
            assert!(KNOWN_STEP_IDS.contains(&id.as_str()), "{} missing", id);
        }
    }
}
