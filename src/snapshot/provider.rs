//! Snapshot providers
//!
//! Two kinds of provider exist: a fixed endpoint that serves one metadata
//! file per network and history mode, and bulk catalogs whose records are
//! filtered by the resolver against the local node version.
//! [`SnapshotCatalog`] is the boundary the wizard talks to: provider errors
//! stop there and become "no snapshot".

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::ProviderError;
use super::http::HttpClient;
use super::metadata::{human_size, parse_catalog, CatalogArtifact, SnapshotMetadata};
use super::resolver::{resolve, ResolverPolicy};
use crate::types::{HistoryMode, Region};
use crate::version::NodeVersionSource;
use crate::wizard::validators::full_url;

/// File name of the catalog document on catalog-style hosts
pub const CATALOG_FILE: &str = "tezos-snapshots.json";

/// A source of snapshot metadata
pub trait SnapshotProvider: Send + Sync {
    fn title(&self) -> &str;

    /// Whether the provider serves per-region mirrors
    fn needs_region(&self) -> bool {
        false
    }

    /// Best snapshot for the request. `Ok(None)` when the provider has none;
    /// errors only for transport or parse failures.
    fn fetch_metadata(
        &self,
        network: &str,
        history_mode: HistoryMode,
        region: Option<Region>,
    ) -> Result<Option<SnapshotMetadata>, ProviderError>;
}

// ============================================================================
// Fixed endpoint provider
// ============================================================================

#[derive(Debug, Deserialize)]
struct EndpointDocument {
    snapshot_header: SnapshotHeader,
}

#[derive(Debug, Deserialize)]
struct SnapshotHeader {
    level: u64,
    #[serde(default)]
    block_hash: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    chain_name: Option<String>,
    /// Snapshot format version
    #[serde(default)]
    version: Option<u32>,
}

/// Provider with one metadata file per network and history mode, served from
/// `https://snapshots.<region>.<domain>/<network>/<mode>.json`.
pub struct FixedEndpointProvider {
    title: String,
    domain: String,
    client: Arc<dyn HttpClient>,
}

impl FixedEndpointProvider {
    pub fn new(title: impl Into<String>, domain: impl Into<String>, client: Arc<dyn HttpClient>) -> Self {
        Self {
            title: title.into(),
            domain: domain.into(),
            client,
        }
    }

    pub fn tzinit(client: Arc<dyn HttpClient>) -> Self {
        Self::new("tzinit", "tzinit.org", client)
    }

    /// Download URL of the snapshot; archive nodes are served full snapshots.
    pub fn snapshot_url(&self, network: &str, history_mode: HistoryMode, region: Region) -> String {
        let mode = match history_mode {
            HistoryMode::Archive => HistoryMode::Full,
            other => other,
        };
        format!("https://snapshots.{}.{}/{}/{}", region, self.domain, network, mode)
    }
}

impl SnapshotProvider for FixedEndpointProvider {
    fn title(&self) -> &str {
        &self.title
    }

    fn needs_region(&self) -> bool {
        true
    }

    fn fetch_metadata(
        &self,
        network: &str,
        history_mode: HistoryMode,
        region: Option<Region>,
    ) -> Result<Option<SnapshotMetadata>, ProviderError> {
        let url = self.snapshot_url(network, history_mode, region.unwrap_or_default());
        let endpoint = format!("{}.json", url);

        let body = match self.client.get(&endpoint) {
            Ok(body) => body,
            Err(ProviderError::Status { status: 404, .. }) => {
                debug!(%endpoint, "No snapshot published for this network and mode");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let header = serde_json::from_slice::<EndpointDocument>(&body)?.snapshot_header;
        if let Some(label) = header.chain_name.as_deref().filter(|label| *label != network) {
            debug!(%endpoint, label, network, "Endpoint labels its chain differently");
        }

        let filesize = match self.client.content_length(&url) {
            Ok(length) => length.map(human_size),
            Err(err) => {
                debug!(%url, error = %err, "Could not read snapshot size");
                None
            }
        };

        Ok(Some(SnapshotMetadata {
            chain_name: network.to_string(),
            history_mode: if history_mode == HistoryMode::Archive {
                HistoryMode::Full.to_string()
            } else {
                history_mode.to_string()
            },
            block_height: header.level,
            block_hash: header.block_hash,
            block_timestamp: header.timestamp,
            url,
            sha256: None,
            filesize,
            node_version: None,
            snapshot_version: header.version,
        }))
    }
}

// ============================================================================
// Catalog provider
// ============================================================================

/// Provider publishing a bulk catalog of snapshot records
pub struct CatalogProvider {
    title: String,
    /// Tried in order until one answers
    catalog_urls: Vec<String>,
    client: Arc<dyn HttpClient>,
    versions: Arc<dyn NodeVersionSource>,
    policy: ResolverPolicy,
}

impl CatalogProvider {
    pub fn new(
        title: impl Into<String>,
        catalog_url: impl Into<String>,
        client: Arc<dyn HttpClient>,
        versions: Arc<dyn NodeVersionSource>,
    ) -> Self {
        Self {
            title: title.into(),
            catalog_urls: vec![catalog_url.into()],
            client,
            versions,
            policy: ResolverPolicy::default(),
        }
    }

    /// Provider for an operator-supplied URL. A URL not naming the catalog
    /// file is tried as-is first, then with the catalog file appended.
    pub fn custom(url: &str, client: Arc<dyn HttpClient>, versions: Arc<dyn NodeVersionSource>) -> Self {
        let url = url.trim();
        let mut provider = Self::new("custom", url, client, versions);
        if !url.trim_end_matches('/').ends_with(CATALOG_FILE) {
            provider.catalog_urls.push(full_url(url, Some(CATALOG_FILE)));
        }
        provider
    }

    pub fn with_policy(mut self, policy: ResolverPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn catalog_urls(&self) -> &[String] {
        &self.catalog_urls
    }

    /// First catalog URL that answers with a parseable document
    fn fetch_catalog(&self) -> Result<Vec<CatalogArtifact>, ProviderError> {
        let mut last_error = ProviderError::Http(format!("{} has no catalog URL", self.title));
        for url in &self.catalog_urls {
            match self.client.get(url).and_then(|body| parse_catalog(&body)) {
                Ok(catalog) => return Ok(catalog),
                Err(err) => {
                    debug!(%url, error = %err, "Catalog URL failed");
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }
}

impl SnapshotProvider for CatalogProvider {
    fn title(&self) -> &str {
        &self.title
    }

    fn fetch_metadata(
        &self,
        network: &str,
        history_mode: HistoryMode,
        _region: Option<Region>,
    ) -> Result<Option<SnapshotMetadata>, ProviderError> {
        let catalog = self.fetch_catalog()?;
        let local = self
            .versions
            .node_version()
            .map_err(|e| ProviderError::Version(e.to_string()))?;

        match resolve(&catalog, network, history_mode, local, &self.policy) {
            Some((tier, artifact)) => {
                debug!(
                    provider = %self.title,
                    ?tier,
                    block_height = artifact.block_height,
                    %local,
                    "Resolved snapshot"
                );
                Ok(Some(artifact.to_metadata()))
            }
            None => Ok(None),
        }
    }
}

// ============================================================================
// Provider set
// ============================================================================

/// A snapshot found at a named provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOffer {
    pub provider: String,
    pub metadata: SnapshotMetadata,
}

/// Ordered set of providers; the first one is the recommended one
#[derive(Clone)]
pub struct SnapshotCatalog {
    providers: Vec<Arc<dyn SnapshotProvider>>,
}

impl SnapshotCatalog {
    pub fn new(providers: Vec<Arc<dyn SnapshotProvider>>) -> Self {
        Self { providers }
    }

    /// tzinit (recommended), marigold.dev and xtz-shots.io
    pub fn defaults(client: Arc<dyn HttpClient>, versions: Arc<dyn NodeVersionSource>) -> Self {
        let tzinit: Arc<dyn SnapshotProvider> = Arc::new(FixedEndpointProvider::tzinit(client.clone()));
        let marigold: Arc<dyn SnapshotProvider> = Arc::new(CatalogProvider::new(
            "marigold.dev",
            "https://snapshots.tezos.marigold.dev/api/tezos-snapshots.json",
            client.clone(),
            versions.clone(),
        ));
        let xtz_shots: Arc<dyn SnapshotProvider> = Arc::new(CatalogProvider::new(
            "xtz-shots.io",
            "https://xtz-shots.io/tezos-snapshots.json",
            client,
            versions,
        ));
        Self::new(vec![tzinit, marigold, xtz_shots])
    }

    pub fn providers(&self) -> &[Arc<dyn SnapshotProvider>] {
        &self.providers
    }

    pub fn recommended(&self) -> Option<&str> {
        self.providers.first().map(|p| p.title())
    }

    pub fn get(&self, title: &str) -> Option<&Arc<dyn SnapshotProvider>> {
        self.providers.iter().find(|p| p.title() == title)
    }

    pub fn needs_region(&self) -> bool {
        self.providers.iter().any(|p| p.needs_region())
    }

    /// Ask one provider, turning failures into "nothing available".
    pub fn lookup(
        provider: &dyn SnapshotProvider,
        network: &str,
        history_mode: HistoryMode,
        region: Option<Region>,
    ) -> Option<SnapshotMetadata> {
        match provider.fetch_metadata(network, history_mode, region) {
            Ok(Some(metadata)) => Some(metadata),
            Ok(None) => {
                info!(provider = provider.title(), network, %history_mode, "No suitable snapshot");
                None
            }
            Err(err @ ProviderError::Version(_)) => {
                tracing::error!(provider = provider.title(), error = %err, "Snapshot lookup needs the node version");
                None
            }
            Err(err) => {
                warn!(provider = provider.title(), error = %err, "Snapshot provider unavailable");
                None
            }
        }
    }

    /// Every provider that currently has a snapshot for the request, in order.
    pub fn offers(&self, network: &str, history_mode: HistoryMode, region: Option<Region>) -> Vec<SnapshotOffer> {
        self.providers
            .iter()
            .filter_map(|p| {
                Self::lookup(p.as_ref(), network, history_mode, region).map(|metadata| SnapshotOffer {
                    provider: p.title().to_string(),
                    metadata,
                })
            })
            .collect()
    }

    /// Ask `preferred` first, then every other provider in order.
    pub fn find_with_fallback(
        &self,
        preferred: &str,
        network: &str,
        history_mode: HistoryMode,
        region: Option<Region>,
    ) -> Option<SnapshotOffer> {
        let ordered = self
            .providers
            .iter()
            .filter(|p| p.title() == preferred)
            .chain(self.providers.iter().filter(|p| p.title() != preferred));

        for provider in ordered {
            if let Some(metadata) = Self::lookup(provider.as_ref(), network, history_mode, region) {
                if provider.title() != preferred {
                    info!(preferred, fallback = provider.title(), "Using fallback snapshot provider");
                }
                return Some(SnapshotOffer {
                    provider: provider.title().to_string(),
                    metadata,
                });
            }
        }
        None
    }
}
