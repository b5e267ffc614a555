//! Snapshot metadata and the catalog record format

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

use super::error::ProviderError;
use crate::version::NodeVersion;

/// Artifact type of snapshot records in a catalog
pub const SNAPSHOT_ARTIFACT: &str = "tezos-snapshot";

/// A snapshot picked for download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub chain_name: String,
    pub history_mode: String,
    pub block_height: u64,
    pub block_hash: Option<String>,
    pub block_timestamp: Option<String>,
    pub url: String,
    pub sha256: Option<String>,
    /// Human-readable size, `None` when the provider does not report one
    pub filesize: Option<String>,
    pub node_version: Option<NodeVersion>,
    pub snapshot_version: Option<u32>,
}

impl fmt::Display for SnapshotMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "URL: {}", self.url)?;
        writeln!(f, "Network: {} ({})", self.chain_name, self.history_mode)?;
        writeln!(f, "Block height: {}", self.block_height)?;
        if let Some(hash) = &self.block_hash {
            writeln!(f, "Block hash: {}", hash)?;
        }
        if let Some(ts) = &self.block_timestamp {
            writeln!(f, "Block timestamp: {}", ts)?;
        }
        if let Some(version) = &self.node_version {
            writeln!(f, "Octez version: {}", version)?;
        }
        write!(f, "Size: {}", self.filesize.as_deref().unwrap_or("not provided"))
    }
}

/// `tezos_version.version` of a catalog record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    pub major: u32,
    pub minor: u32,
    /// Either a string such as `"release"` or an object carrying `rc`
    #[serde(default)]
    pub additional_info: Value,
}

impl ArtifactVersion {
    pub fn rc(&self) -> Option<u32> {
        self.additional_info
            .as_object()
            .and_then(|info| info.get("rc"))
            .and_then(Value::as_u64)
            .and_then(|rc| u32::try_from(rc).ok())
    }

    pub fn node_version(&self) -> NodeVersion {
        NodeVersion::new(self.major, self.minor, self.rc())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactTezosVersion {
    pub version: ArtifactVersion,
}

/// One record of a bulk snapshot catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogArtifact {
    pub artifact_type: String,
    pub chain_name: String,
    pub history_mode: String,
    pub block_height: u64,
    pub url: String,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_timestamp: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub filesize_bytes: Option<u64>,
    #[serde(default)]
    pub filesize: Option<String>,
    #[serde(default)]
    pub tezos_version: Option<ArtifactTezosVersion>,
    #[serde(default)]
    pub snapshot_version: Option<u32>,
}

impl CatalogArtifact {
    pub fn node_version(&self) -> Option<NodeVersion> {
        self.tezos_version.as_ref().map(|v| v.version.node_version())
    }

    pub fn rc(&self) -> Option<u32> {
        self.tezos_version.as_ref().and_then(|v| v.version.rc())
    }

    pub fn to_metadata(&self) -> SnapshotMetadata {
        SnapshotMetadata {
            chain_name: self.chain_name.clone(),
            history_mode: self.history_mode.clone(),
            block_height: self.block_height,
            block_hash: self.block_hash.clone(),
            block_timestamp: self.block_timestamp.clone(),
            url: self.url.clone(),
            sha256: self.sha256.clone(),
            filesize: self
                .filesize_bytes
                .map(human_size)
                .or_else(|| self.filesize.clone()),
            node_version: self.node_version(),
            snapshot_version: self.snapshot_version,
        }
    }
}

/// Parse a catalog document: either a bare array or an object with a `data`
/// array. Records that do not deserialize are skipped.
pub fn parse_catalog(body: &[u8]) -> Result<Vec<CatalogArtifact>, ProviderError> {
    let document: Value = serde_json::from_slice(body)?;
    let records = match document {
        Value::Array(records) => records,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(records)) => records,
            _ => return Err(ProviderError::Parse("catalog object has no 'data' array".into())),
        },
        _ => return Err(ProviderError::Parse("catalog is neither an array nor an object".into())),
    };

    let total = records.len();
    let artifacts: Vec<CatalogArtifact> = records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<CatalogArtifact>(record) {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                warn!(error = %err, "Skipping malformed catalog record");
                None
            }
        })
        .collect();
    if artifacts.len() < total {
        warn!(skipped = total - artifacts.len(), total, "Catalog contained malformed records");
    }
    Ok(artifacts)
}

/// `1536` → `1.5KB`
pub fn human_size(bytes: u64) -> String {
    const SUFFIXES: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut i = 0;
    while size >= 1024.0 && i < SUFFIXES.len() - 1 {
        size /= 1024.0;
        i += 1;
    }
    let formatted = format!("{:.2}", size);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", trimmed, SUFFIXES[i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rc_from_additional_info() {
        let stable: ArtifactVersion =
            serde_json::from_str(r#"{"major":19,"minor":0,"additional_info":"release"}"#).unwrap();
        assert_eq!(stable.rc(), None);
        let rc: ArtifactVersion =
            serde_json::from_str(r#"{"major":19,"minor":0,"additional_info":{"rc":2}}"#).unwrap();
        assert_eq!(rc.rc(), Some(2));
        let null_rc: ArtifactVersion =
            serde_json::from_str(r#"{"major":19,"minor":0,"additional_info":{"rc":null}}"#).unwrap();
        assert_eq!(null_rc.rc(), None);
        let missing: ArtifactVersion = serde_json::from_str(r#"{"major":19,"minor":0}"#).unwrap();
        assert_eq!(missing.node_version(), NodeVersion::new(19, 0, None));
    }

    #[test]
    fn test_parse_catalog_shapes() {
        let record = r#"{"artifact_type":"tezos-snapshot","chain_name":"mainnet","history_mode":"rolling","block_height":5,"url":"https://x/s"}"#;
        let wrapped = format!(r#"{{"data":[{}]}}"#, record);
        let bare = format!("[{}]", record);
        assert_eq!(parse_catalog(wrapped.as_bytes()).unwrap().len(), 1);
        assert_eq!(parse_catalog(bare.as_bytes()).unwrap().len(), 1);
        assert!(matches!(parse_catalog(b"42"), Err(ProviderError::Parse(_))));
        assert!(matches!(parse_catalog(b"{\"items\":[]}"), Err(ProviderError::Parse(_))));
        assert!(matches!(parse_catalog(b"not json"), Err(ProviderError::Parse(_))));
    }

    #[test]
    fn test_parse_catalog_skips_malformed_records() {
        let body = r#"[{"artifact_type":"tezos-snapshot"},{"artifact_type":"tezos-snapshot","chain_name":"ghostnet","history_mode":"full","block_height":9,"url":"u"}]"#;
        let artifacts = parse_catalog(body.as_bytes()).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].chain_name, "ghostnet");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512B");
        assert_eq!(human_size(1536), "1.5KB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3GB");
    }

    #[test]
    fn test_metadata_display() {
        let artifact = CatalogArtifact {
            artifact_type: SNAPSHOT_ARTIFACT.into(),
            chain_name: "mainnet".into(),
            history_mode: "rolling".into(),
            block_height: 100,
            url: "https://x/s".into(),
            block_hash: Some("BLockHash".into()),
            block_timestamp: None,
            sha256: None,
            filesize_bytes: None,
            filesize: None,
            tezos_version: None,
            snapshot_version: None,
        };
        let text = artifact.to_metadata().to_string();
        assert!(text.contains("Block height: 100"));
        assert!(text.contains("Block hash: BLockHash"));
        assert!(text.ends_with("Size: not provided"));
    }
}
