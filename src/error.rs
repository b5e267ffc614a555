//! Error handling for the setup wizard
//!
//! Every fallible wizard operation returns [`WizardError`]. Cancellation is
//! carried through the same channel but is a control signal, not a failure:
//! callers check [`WizardError::is_cancellation`] before treating it as one.

use std::fmt;
use thiserror::Error;

/// Why the operator left the wizard early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Typed `quit` or `exit` at a prompt
    Quit,
    /// Standard input was closed
    EndOfInput,
    /// SIGINT/SIGTERM/SIGHUP
    Interrupted,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Quit => "operator quit",
            Self::EndOfInput => "end of input",
            Self::Interrupted => "interrupted",
        };
        f.write_str(text)
    }
}

/// Main error type for the wizard
#[derive(Error, Debug)]
pub enum WizardError {
    /// IO errors (terminal, files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An answer was rejected by a step's validator
    #[error("Validation error: {0}")]
    Validation(String),

    /// Non-interactive run without a value for a step that has no default
    #[error("Missing required argument for step '{step}'")]
    MissingArgument { step: String },

    /// More than one option branch is satisfiable from the automation input
    #[error("Conflicting arguments: more than one of {} was supplied", steps.join(", "))]
    ConflictingArguments { steps: Vec<String> },

    /// Operator quit, closed input, or sent a signal
    #[error("Setup cancelled: {0}")]
    Cancelled(CancelReason),

    /// Snapshot provider failure that escaped the provider boundary
    #[error("Snapshot provider error: {0}")]
    Provider(String),

    /// The local node version could not be determined
    #[error("Node version error: {0}")]
    NodeVersion(String),

    /// A call into an external collaborator (systemctl, octez binaries) failed
    #[error("External command failed: {0}")]
    External(String),

    /// Invalid configuration state
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catch-all
    #[error("{0}")]
    General(String),
}

/// Result type alias for wizard operations
pub type Result<T> = std::result::Result<T, WizardError>;

impl WizardError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_argument(step: impl Into<String>) -> Self {
        Self::MissingArgument { step: step.into() }
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn node_version(msg: impl Into<String>) -> Self {
        Self::NodeVersion(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::External(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::General(msg.into())
    }

    /// Quit, end-of-input and signals unwind the wizard without being failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Failures after which an interactive run may go back to the previous step.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::External(_) | Self::Validation(_))
    }
}

/// Rejection produced by a validator, carrying the reason shown to the operator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<ValidationError> for WizardError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.0)
    }
}
