//! Baking Setup Library
//!
//! The interactive setup wizard for a node and baker, and the snapshot
//! compatibility resolver it uses to pick a bootstrap snapshot.

pub mod backend;
pub mod cli;
pub mod config;
pub mod config_file;
pub mod error;
pub mod flow;
pub mod logging;
pub mod service_guard;
pub mod services;
pub mod snapshot;
pub mod steps;
pub mod types;
pub mod version;
pub mod wizard;

// Re-export main types for convenience
pub use config::{AutomationInput, WizardConfig};
pub use config_file::AnswersFile;
pub use error::{CancelReason, Result, ValidationError, WizardError};
pub use flow::{SetupFlow, SetupOutcome};
pub use service_guard::{ServiceGuard, ServiceRegistry};
pub use services::{ServiceAction, ServiceManager, Systemctl};
pub use snapshot::{
    resolve, CatalogArtifact, MatchTier, ResolverPolicy, SnapshotCatalog, SnapshotMetadata,
    SnapshotOffer, SnapshotProvider,
};
pub use types::{HistoryMode, KeyImportMode, Region, ServiceMode, Toggle, ToggleVote};
pub use version::{NodeVersion, NodeVersionSource};
pub use wizard::{resolve_step_path, Prompter, ScriptedPrompter, Setup, Step, StepOptions, Validator};
