// Snapshot providers over a canned HTTP client, and answers files on disk

use std::collections::HashMap;
use std::sync::Arc;

use baking_setup::snapshot::provider::FixedEndpointProvider;
use baking_setup::snapshot::{CatalogProvider, HttpClient, ProviderError};
use baking_setup::{
    AnswersFile, AutomationInput, HistoryMode, NodeVersion, NodeVersionSource, Region, ResolverPolicy,
    SnapshotCatalog, SnapshotProvider, WizardConfig, WizardError,
};
use tempfile::TempDir;

#[derive(Default)]
struct CannedClient {
    bodies: HashMap<String, String>,
}

impl CannedClient {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }
}

impl HttpClient for CannedClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.bodies
            .get(url)
            .map(|b| b.as_bytes().to_vec())
            .ok_or_else(|| ProviderError::Status {
                status: 404,
                url: url.to_string(),
            })
    }

    fn content_length(&self, _url: &str) -> Result<Option<u64>, ProviderError> {
        Ok(None)
    }
}

struct BrokenVersion;

impl NodeVersionSource for BrokenVersion {
    fn node_version(&self) -> baking_setup::Result<NodeVersion> {
        Err(WizardError::node_version("octez-node not found"))
    }
}

const CATALOG_URL: &str = "https://mirror.example/tezos-snapshots.json";

const CATALOG: &str = r#"[
    {"artifact_type":"tezos-snapshot","chain_name":"mainnet","history_mode":"full","block_height":500,
     "url":"https://mirror.example/full-500","sha256":"abc",
     "tezos_version":{"version":{"major":19,"minor":0,"additional_info":"release"}},"snapshot_version":8},
    {"artifact_type":"tezos-tarball","chain_name":"mainnet","history_mode":"full","block_height":900,
     "url":"https://mirror.example/tarball"},
    {"chain_name":"mainnet"}
]"#;

fn client() -> Arc<dyn HttpClient> {
    Arc::new(CannedClient::default().with(CATALOG_URL, CATALOG))
}

fn node(major: u32, minor: u32) -> Arc<dyn NodeVersionSource> {
    Arc::new(NodeVersion::new(major, minor, None))
}

#[test]
fn test_catalog_skips_malformed_and_foreign_records() {
    let provider = CatalogProvider::new("mirror", CATALOG_URL, client(), node(19, 0));
    let metadata = provider
        .fetch_metadata("mainnet", HistoryMode::Archive, None)
        .unwrap()
        .unwrap();
    assert_eq!(metadata.block_height, 500);
    assert_eq!(metadata.sha256.as_deref(), Some("abc"));
    assert_eq!(metadata.node_version, Some(NodeVersion::new(19, 0, None)));
}

#[test]
fn test_newer_snapshot_format_is_accepted() {
    // Format 8 on a node supporting 7 passes the best-effort tier.
    let provider = CatalogProvider::new("mirror", CATALOG_URL, client(), node(20, 1));
    assert!(provider
        .fetch_metadata("mainnet", HistoryMode::Full, None)
        .unwrap()
        .is_some());

    let strict = CatalogProvider::new("mirror", CATALOG_URL, client(), node(20, 1)).with_policy(ResolverPolicy {
        supported_snapshot_version: 11,
        format_tolerance: 2,
    });
    assert_eq!(strict.fetch_metadata("mainnet", HistoryMode::Full, None).unwrap(), None);
}

#[test]
fn test_unknown_node_version_is_a_version_error() {
    let provider = CatalogProvider::new("mirror", CATALOG_URL, client(), Arc::new(BrokenVersion));
    let err = provider
        .fetch_metadata("mainnet", HistoryMode::Full, None)
        .unwrap_err();
    assert!(matches!(err, ProviderError::Version(_)));
    assert!(SnapshotCatalog::lookup(&provider, "mainnet", HistoryMode::Full, None).is_none());
}

#[test]
fn test_fixed_endpoint_uses_region() {
    let client: Arc<dyn HttpClient> = Arc::new(CannedClient::default().with(
        "https://snapshots.asia.tzinit.org/mainnet/rolling.json",
        r#"{"snapshot_header":{"level":7,"version":7,"chain_name":"TEZOS_MAINNET_2018"}}"#,
    ));
    let provider = FixedEndpointProvider::tzinit(client);
    assert!(provider.needs_region());

    let metadata = provider
        .fetch_metadata("mainnet", HistoryMode::Rolling, Some(Region::Asia))
        .unwrap()
        .unwrap();
    // The requested network is shown, not the endpoint's own chain label.
    assert_eq!(metadata.chain_name, "mainnet");
    assert_eq!(metadata.filesize, None);
    assert_eq!(
        provider
            .fetch_metadata("mainnet", HistoryMode::Rolling, Some(Region::Eu))
            .unwrap(),
        None
    );
}

#[test]
fn test_default_catalog() {
    let catalog = SnapshotCatalog::defaults(client(), node(19, 0));
    let titles: Vec<&str> = catalog.providers().iter().map(|p| p.title()).collect();
    assert_eq!(titles, vec!["tzinit", "marigold.dev", "xtz-shots.io"]);
    assert_eq!(catalog.recommended(), Some("tzinit"));
    assert!(catalog.needs_region());
}

#[test]
fn test_catalog_without_region_providers() {
    let provider: Arc<dyn SnapshotProvider> =
        Arc::new(CatalogProvider::new("mirror", CATALOG_URL, client(), node(19, 0)));
    let catalog = SnapshotCatalog::new(vec![provider]);
    assert!(!catalog.needs_region());
    let offers = catalog.offers("mainnet", HistoryMode::Full, None);
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].provider, "mirror");
}

// =============================================================================
// Answers files
// =============================================================================

#[test]
fn test_answers_round_trip_through_automation_input() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("answers.json");

    let mut config = WizardConfig::new();
    config.set("network", "ghostnet");
    config.set("mode", "baking");
    config.set("snapshot_sha256", "");
    config.set("node_rpc_endpoint", "http://localhost:8732");
    AnswersFile::from_config(&config).save_to_file(&path).unwrap();

    let loaded = AnswersFile::load_from_file(&path).unwrap();
    assert_eq!(loaded.answers.len(), 2);

    // Explicit arguments win over the file.
    let mut input = AutomationInput::new(true).with("network", "mainnet");
    input.merge_missing(loaded.answers);
    assert_eq!(input.get("network"), Some("mainnet"));
    assert_eq!(input.get("mode"), Some("baking"));
}

#[test]
fn test_answers_file_with_typo_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("answers.json");
    std::fs::write(&path, r#"{"netwrok":"mainnet"}"#).unwrap();

    let err = AnswersFile::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("netwrok"));
}
