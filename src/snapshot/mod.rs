//! Snapshot discovery
//!
//! - `http` - HTTP client seam
//! - `metadata` - snapshot records and the catalog format
//! - `resolver` - tiered compatibility matching over a catalog
//! - `provider` - fixed-endpoint and catalog providers, and the provider set

pub mod error;
pub mod http;
pub mod metadata;
pub mod provider;
pub mod resolver;

pub use error::ProviderError;
pub use http::{HttpClient, ReqwestClient};
pub use metadata::{parse_catalog, CatalogArtifact, SnapshotMetadata};
pub use provider::{
    CatalogProvider, FixedEndpointProvider, SnapshotCatalog, SnapshotOffer, SnapshotProvider,
};
pub use resolver::{resolve, MatchTier, ResolverPolicy};
