// Snapshot resolver behaviour against catalogs in the published JSON format

use baking_setup::snapshot::{parse_catalog, resolve, CatalogArtifact, MatchTier, ResolverPolicy};
use baking_setup::{HistoryMode, NodeVersion};
use serde_json::{json, Value};

fn record(net: &str, history: &str, height: u64, major: u32, minor: u32, rc: Option<u32>, sv: Option<u32>) -> Value {
    let additional_info = match rc {
        Some(rc) => json!({ "rc": rc }),
        None => json!("release"),
    };
    let mut value = json!({
        "artifact_type": "tezos-snapshot",
        "chain_name": net,
        "history_mode": history,
        "block_height": height,
        "url": format!("https://example.org/{}/{}/{}", net, history, height),
        "tezos_version": { "version": { "major": major, "minor": minor, "additional_info": additional_info } },
    });
    if let Some(sv) = sv {
        value["snapshot_version"] = json!(sv);
    }
    value
}

fn catalog(records: Vec<Value>) -> Vec<CatalogArtifact> {
    let body = serde_json::to_vec(&json!({ "data": records })).unwrap();
    parse_catalog(&body).unwrap()
}

fn best(
    catalog: &[CatalogArtifact],
    network: &str,
    mode: HistoryMode,
    local: NodeVersion,
) -> Option<(MatchTier, u64)> {
    resolve(catalog, network, mode, local, &ResolverPolicy::default()).map(|(tier, a)| (tier, a.block_height))
}

#[test]
fn test_most_recent_exact_match_wins() {
    let catalog = catalog(vec![
        record("mainnet", "full", 90, 19, 0, None, Some(7)),
        record("mainnet", "full", 100, 19, 0, None, Some(7)),
    ]);
    assert_eq!(
        best(&catalog, "mainnet", HistoryMode::Full, NodeVersion::new(19, 0, None)),
        Some((MatchTier::Exact, 100))
    );
}

#[test]
fn test_best_effort_within_format_tolerance() {
    let catalog = catalog(vec![record("mainnet", "full", 50, 18, 1, None, Some(6))]);
    assert_eq!(
        best(&catalog, "mainnet", HistoryMode::Full, NodeVersion::new(19, 0, None)),
        Some((MatchTier::BestEffort, 50))
    );
}

#[test]
fn test_archive_accepts_full_but_not_rolling() {
    let full_only = catalog(vec![record("testnet", "full", 10, 19, 0, None, Some(7))]);
    assert_eq!(
        best(&full_only, "testnet", HistoryMode::Archive, NodeVersion::new(19, 0, None)),
        Some((MatchTier::Exact, 10))
    );

    let rolling_only = catalog(vec![record("testnet", "rolling", 10, 19, 0, None, Some(7))]);
    assert_eq!(
        best(&rolling_only, "testnet", HistoryMode::Archive, NodeVersion::new(19, 0, None)),
        None
    );
}

#[test]
fn test_full_request_rejects_archive_snapshot() {
    let catalog = catalog(vec![record("mainnet", "archive", 10, 19, 0, None, Some(7))]);
    assert_eq!(best(&catalog, "mainnet", HistoryMode::Full, NodeVersion::new(19, 0, None)), None);
}

#[test]
fn test_compatible_tier_preferred_over_newer_best_effort() {
    let catalog = catalog(vec![
        record("mainnet", "rolling", 300, 20, 0, None, Some(7)),
        record("mainnet", "rolling", 200, 19, 0, None, Some(7)),
    ]);
    assert_eq!(
        best(&catalog, "mainnet", HistoryMode::Rolling, NodeVersion::new(19, 1, None)),
        Some((MatchTier::Compatible, 200))
    );
}

#[test]
fn test_stable_node_skips_release_candidates() {
    let catalog = catalog(vec![
        record("mainnet", "rolling", 300, 20, 0, Some(1), Some(7)),
        record("mainnet", "rolling", 100, 18, 0, None, Some(7)),
    ]);
    assert_eq!(
        best(&catalog, "mainnet", HistoryMode::Rolling, NodeVersion::new(19, 0, None)),
        Some((MatchTier::BestEffort, 100))
    );
}

#[test]
fn test_rc_node_accepts_release_candidates() {
    let catalog = catalog(vec![record("mainnet", "rolling", 300, 20, 0, Some(1), Some(7))]);
    assert_eq!(
        best(&catalog, "mainnet", HistoryMode::Rolling, NodeVersion::new(20, 0, Some(2))),
        Some((MatchTier::Compatible, 300))
    );
}

#[test]
fn test_missing_format_version_only_matches_exactly() {
    let catalog = catalog(vec![record("mainnet", "rolling", 300, 18, 0, None, None)]);
    assert_eq!(best(&catalog, "mainnet", HistoryMode::Rolling, NodeVersion::new(19, 0, None)), None);
    assert_eq!(
        best(&catalog, "mainnet", HistoryMode::Rolling, NodeVersion::new(18, 0, None)),
        Some((MatchTier::Exact, 300))
    );
}

#[test]
fn test_non_object_additional_info_means_no_rc() {
    let body = br#"[{"artifact_type":"tezos-snapshot","chain_name":"mainnet","history_mode":"rolling",
        "block_height":7,"url":"https://x","snapshot_version":7,
        "tezos_version":{"version":{"major":19,"minor":0,"additional_info":["dev"]}}}]"#;
    let catalog = parse_catalog(body).unwrap();
    assert_eq!(
        best(&catalog, "mainnet", HistoryMode::Rolling, NodeVersion::new(19, 0, None)),
        Some((MatchTier::Exact, 7))
    );
}

#[test]
fn test_tolerance_is_configurable() {
    let catalog = catalog(vec![record("mainnet", "rolling", 10, 18, 0, None, Some(4))]);
    let local = NodeVersion::new(19, 0, None);
    assert!(resolve(&catalog, "mainnet", HistoryMode::Rolling, local, &ResolverPolicy::default()).is_none());

    let lenient = ResolverPolicy {
        supported_snapshot_version: 7,
        format_tolerance: 3,
    };
    assert!(resolve(&catalog, "mainnet", HistoryMode::Rolling, local, &lenient).is_some());
}
