//! Typed values for wizard answers
//!
//! Answers are stored as strings in the configuration map; these enums give
//! the flow code exhaustive matching over them.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// How much chain history a node keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HistoryMode {
    #[default]
    Rolling,
    Full,
    Archive,
}

impl HistoryMode {
    /// Whether a node running in `self` can bootstrap from a snapshot taken in `offered`.
    ///
    /// Archive nodes can import full snapshots and reconstruct the rest; the
    /// reverse does not hold.
    pub const fn accepts(self, offered: HistoryMode) -> bool {
        matches!(
            (self, offered),
            (Self::Rolling, Self::Rolling)
                | (Self::Full, Self::Full)
                | (Self::Archive, Self::Archive)
                | (Self::Archive, Self::Full)
        )
    }

    /// Same rule as [`accepts`](Self::accepts) for a history mode read from catalog text.
    pub fn accepts_label(self, offered: &str) -> bool {
        offered
            .parse::<HistoryMode>()
            .map(|mode| self.accepts(mode))
            .unwrap_or(false)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Rolling => "Store a minimal rolling window of chain data, lightest option",
            Self::Full => "Store enough chain data to reconstruct the complete chain state",
            Self::Archive => "Store all the chain data, very storage-demanding",
        }
    }
}

/// What the wizard sets up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceMode {
    #[default]
    Baking,
    Node,
}

impl ServiceMode {
    pub const fn description(self) -> &'static str {
        match self {
            Self::Baking => "Set up and start all services for baking: node and baker",
            Self::Node => "Only bootstrap and run the node",
        }
    }
}

/// Plain yes/no answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Toggle {
    Yes,
    #[default]
    No,
}

impl Toggle {
    pub const fn is_yes(self) -> bool {
        matches!(self, Self::Yes)
    }
}

/// Snapshot mirror region for fixed-endpoint providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Region {
    #[default]
    Eu,
    Us,
    Asia,
}

impl Region {
    pub const fn description(self) -> &'static str {
        match self {
            Self::Eu => "European region",
            Self::Us => "US region",
            Self::Asia => "Asian region",
        }
    }
}

/// How the baker key gets into the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum KeyImportMode {
    #[default]
    Ledger,
    SecretKey,
    Remote,
    GenerateFreshKey,
    Json,
}

impl KeyImportMode {
    /// Modes only offered on test networks
    pub const fn test_networks_only(self) -> bool {
        matches!(self, Self::GenerateFreshKey | Self::Json)
    }
}

/// Liquidity baking toggle vote written to the baker environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToggleVote {
    #[default]
    Pass,
    Off,
    On,
}

impl ToggleVote {
    pub const fn description(self) -> &'static str {
        match self {
            Self::Pass => "Abstain from the vote",
            Self::Off => "Request to end the subsidy",
            Self::On => "Request to continue the subsidy",
        }
    }
}

/// Networks offered when nothing else is known
pub const DEFAULT_NETWORKS: &[&str] = &["mainnet", "ghostnet"];

/// Lowercase labels of every variant, in declaration order.
pub fn labels<E: IntoEnumIterator + ToString>() -> Vec<String> {
    E::iter().map(|v| v.to_string()).collect()
}
