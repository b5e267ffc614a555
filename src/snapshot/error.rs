use thiserror::Error;

/// Failures while talking to a snapshot provider.
///
/// These never leave the provider boundary: [`SnapshotCatalog`](super::SnapshotCatalog)
/// logs them and reports "no snapshot" instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Failed to parse snapshot metadata: {0}")]
    Parse(String),

    #[error("Cannot determine local node version: {0}")]
    Version(String),
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
