//! Run-scoped configuration state
//!
//! [`WizardConfig`] is the single map of answers for one wizard run. It is
//! owned by the setup driver and only handed out as `&mut` to post-answer
//! actions. [`AutomationInput`] is the read-only argument source that can
//! pre-answer steps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{Result, WizardError};

/// Answers collected during a wizard run, keyed by step id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WizardConfig {
    values: BTreeMap<String, String>,
}

impl WizardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Store a value. Re-querying a step overwrites its previous answer.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Drop a derived value that no longer follows from the answers.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Value that a later step cannot do without
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| WizardError::config(format!("'{}' has not been answered yet", key)))
    }

    /// Parse a stored answer into one of the typed enums.
    pub fn parsed<T: FromStr>(&self, key: &str) -> Result<T> {
        let raw = self.require(key)?;
        raw.parse::<T>().map_err(|_| {
            WizardError::config(format!("'{}' holds an unexpected value '{}'", key, raw))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Pre-supplied answers from command-line flags or an answers file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutomationInput {
    values: BTreeMap<String, String>,
    non_interactive: bool,
}

impl AutomationInput {
    pub fn new(non_interactive: bool) -> Self {
        Self {
            values: BTreeMap::new(),
            non_interactive,
        }
    }

    /// Builder-style insert, used heavily in tests
    pub fn with(mut self, step_id: &str, value: impl Into<String>) -> Self {
        self.values.insert(step_id.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, step_id: impl Into<String>, value: impl Into<String>) {
        self.values.insert(step_id.into(), value.into());
    }

    /// Add values that are not already present (explicit flags win over files).
    pub fn merge_missing(&mut self, other: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in other {
            self.values.entry(key).or_insert(value);
        }
    }

    pub fn get(&self, step_id: &str) -> Option<&str> {
        self.values.get(step_id).map(String::as_str)
    }

    pub fn non_interactive(&self) -> bool {
        self.non_interactive
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
