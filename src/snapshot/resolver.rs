//! Snapshot compatibility resolver
//!
//! Picks the best snapshot for the local node out of a bulk catalog.
//!
//! # Design
//!
//! - **Recency first**: candidates are ordered by descending block height, and
//!   every tier takes the first match in that order
//! - **Tiered**: tiers are tried in order and the first one with a match wins
//! - **Pure logic**: no I/O, the catalog is already in memory
//!
//! # Tiers
//!
//! | Tier        | Version constraint                                           | Guard + format |
//! |-------------|--------------------------------------------------------------|----------------|
//! | Exact       | `(major, minor, rc)` equals the local node                   | no             |
//! | Compatible  | same major+minor with an older rc, or same major with an older minor and no rc | yes |
//! | BestEffort  | none                                                         | yes            |
//!
//! The guard keeps release-candidate snapshots away from stable nodes. The
//! format check rejects snapshots whose format version is missing or more than
//! the tolerance older than what the node supports.

use crate::types::HistoryMode;
use crate::version::NodeVersion;

use super::metadata::{CatalogArtifact, SNAPSHOT_ARTIFACT};

/// Snapshot format version understood by current nodes
pub const SUPPORTED_SNAPSHOT_VERSION: u32 = 7;
/// How many format versions behind a snapshot may be
pub const SNAPSHOT_FORMAT_TOLERANCE: u32 = 2;

/// Compatibility constants for the Compatible and BestEffort tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverPolicy {
    pub supported_snapshot_version: u32,
    pub format_tolerance: u32,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            supported_snapshot_version: SUPPORTED_SNAPSHOT_VERSION,
            format_tolerance: SNAPSHOT_FORMAT_TOLERANCE,
        }
    }
}

impl ResolverPolicy {
    /// A missing or zero format version never passes. Newer formats than the
    /// supported one pass: they are not older than the tolerance allows.
    pub fn format_compatible(&self, snapshot_version: Option<u32>) -> bool {
        match snapshot_version {
            Some(version) if version > 0 => {
                i64::from(self.supported_snapshot_version) - i64::from(version)
                    <= i64::from(self.format_tolerance)
            }
            _ => false,
        }
    }
}

/// Which tier produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    Exact,
    Compatible,
    BestEffort,
}

// ============================================================================
// Resolution
// ============================================================================

/// Find the best snapshot in `catalog` for `network`/`history_mode` and the
/// local node version. `None` means only non-snapshot bootstrap remains.
pub fn resolve<'a>(
    catalog: &'a [CatalogArtifact],
    network: &str,
    history_mode: HistoryMode,
    local: NodeVersion,
    policy: &ResolverPolicy,
) -> Option<(MatchTier, &'a CatalogArtifact)> {
    let mut candidates: Vec<&CatalogArtifact> = catalog
        .iter()
        .filter(|a| passes_base_filter(a, network, history_mode))
        .collect();
    candidates.sort_by(|a, b| b.block_height.cmp(&a.block_height));

    [MatchTier::Exact, MatchTier::Compatible, MatchTier::BestEffort]
        .into_iter()
        .find_map(|tier| {
            candidates
                .iter()
                .find(|a| matches_tier(tier, a, local, policy))
                .map(|a| (tier, *a))
        })
}

/// Snapshot artifact of the right chain whose history mode the request accepts
pub fn passes_base_filter(artifact: &CatalogArtifact, network: &str, history_mode: HistoryMode) -> bool {
    artifact.artifact_type == SNAPSHOT_ARTIFACT
        && artifact.chain_name == network
        && history_mode.accepts_label(&artifact.history_mode)
}

fn matches_tier(
    tier: MatchTier,
    artifact: &CatalogArtifact,
    local: NodeVersion,
    policy: &ResolverPolicy,
) -> bool {
    let offered = artifact.node_version();
    match tier {
        MatchTier::Exact => offered == Some(local),
        MatchTier::Compatible => {
            let Some(offered) = offered else {
                return false;
            };
            let older_rc = offered.major == local.major
                && offered.minor == local.minor
                && matches!((offered.rc, local.rc), (Some(theirs), Some(ours)) if ours > theirs);
            let older_stable_minor =
                offered.major == local.major && offered.minor < local.minor && offered.rc.is_none();
            stable_guard(artifact, local)
                && policy.format_compatible(artifact.snapshot_version)
                && (older_rc || older_stable_minor)
        }
        MatchTier::BestEffort => {
            stable_guard(artifact, local) && policy.format_compatible(artifact.snapshot_version)
        }
    }
}

/// Release candidates only ever go to release-candidate nodes.
fn stable_guard(artifact: &CatalogArtifact, local: NodeVersion) -> bool {
    local.is_release_candidate() || artifact.rc().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::metadata::{ArtifactTezosVersion, ArtifactVersion};
    use serde_json::json;

    fn artifact(height: u64, major: u32, minor: u32, rc: Option<u32>, sv: Option<u32>) -> CatalogArtifact {
        let additional_info = match rc {
            Some(rc) => json!({ "rc": rc }),
            None => json!("release"),
        };
        CatalogArtifact {
            artifact_type: SNAPSHOT_ARTIFACT.into(),
            chain_name: "mainnet".into(),
            history_mode: "rolling".into(),
            block_height: height,
            url: format!("https://snapshots.example/{}", height),
            block_hash: None,
            block_timestamp: None,
            sha256: None,
            filesize_bytes: None,
            filesize: None,
            tezos_version: Some(ArtifactTezosVersion {
                version: ArtifactVersion {
                    major,
                    minor,
                    additional_info,
                },
            }),
            snapshot_version: sv,
        }
    }

    fn run(catalog: &[CatalogArtifact], local: NodeVersion) -> Option<(MatchTier, u64)> {
        resolve(catalog, "mainnet", HistoryMode::Rolling, local, &ResolverPolicy::default())
            .map(|(tier, a)| (tier, a.block_height))
    }

    #[test]
    fn test_exact_beats_newer_compatible() {
        let catalog = vec![artifact(200, 19, 0, None, Some(7)), artifact(100, 19, 1, None, Some(7))];
        assert_eq!(run(&catalog, NodeVersion::new(19, 1, None)), Some((MatchTier::Exact, 100)));
    }

    #[test]
    fn test_compatible_older_minor() {
        let catalog = vec![artifact(90, 19, 0, None, Some(7)), artifact(80, 18, 0, None, Some(7))];
        assert_eq!(run(&catalog, NodeVersion::new(19, 1, None)), Some((MatchTier::Compatible, 90)));
    }

    #[test]
    fn test_compatible_older_rc_on_rc_node() {
        let catalog = vec![artifact(90, 20, 0, Some(1), Some(7))];
        assert_eq!(run(&catalog, NodeVersion::new(20, 0, Some(2))), Some((MatchTier::Compatible, 90)));
    }

    #[test]
    fn test_rc_snapshot_never_for_stable_node() {
        let catalog = vec![artifact(90, 19, 1, Some(1), Some(7))];
        assert_eq!(run(&catalog, NodeVersion::new(19, 1, None)), None);
    }

    #[test]
    fn test_format_tolerance() {
        let policy = ResolverPolicy::default();
        assert!(policy.format_compatible(Some(5)));
        assert!(!policy.format_compatible(Some(4)));
        assert!(policy.format_compatible(Some(8)));
        assert!(!policy.format_compatible(None));
        assert!(!policy.format_compatible(Some(0)));

        let strict = ResolverPolicy {
            supported_snapshot_version: 7,
            format_tolerance: 0,
        };
        let catalog = vec![artifact(50, 18, 1, None, Some(6))];
        assert!(resolve(&catalog, "mainnet", HistoryMode::Rolling, NodeVersion::new(19, 0, None), &strict).is_none());
    }

    #[test]
    fn test_missing_format_only_exact() {
        let catalog = vec![artifact(60, 19, 0, None, None)];
        assert_eq!(run(&catalog, NodeVersion::new(19, 0, None)), Some((MatchTier::Exact, 60)));
        assert_eq!(run(&catalog, NodeVersion::new(19, 1, None)), None);
    }

    #[test]
    fn test_base_filter() {
        let mut other_chain = artifact(300, 19, 0, None, Some(7));
        other_chain.chain_name = "ghostnet".into();
        let mut other_type = artifact(250, 19, 0, None, Some(7));
        other_type.artifact_type = "tezos-tarball".into();
        let catalog = vec![other_chain, other_type, artifact(10, 19, 0, None, Some(7))];
        assert_eq!(run(&catalog, NodeVersion::new(19, 0, None)), Some((MatchTier::Exact, 10)));
    }
}
