//! Answers file handling
//!
//! An answers file is a flat JSON object of step id to answer. It can seed
//! the automation input of a run, and the final configuration of a run can
//! be written back in the same shape for reuse on another machine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::config::WizardConfig;
use crate::steps::{KNOWN_STEP_IDS, SECRET_STEP_IDS};

/// Pre-answered steps that can be saved and loaded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswersFile {
    pub answers: BTreeMap<String, String>,
}

impl AnswersFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the answers of a finished run, dropping derived fields that
    /// no step asks for and skipped optional answers. Secret material is
    /// never written out and has to be supplied again on replay.
    pub fn from_config(config: &WizardConfig) -> Self {
        let answers = config
            .iter()
            .filter(|(key, value)| KNOWN_STEP_IDS.contains(key) && !value.is_empty())
            .filter(|(key, _)| {
                let secret = SECRET_STEP_IDS.contains(key);
                if secret {
                    warn!(step = *key, "Not saving secret answer to the answers file");
                }
                !secret
            })
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { answers }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize answers to JSON")?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write answers to {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read answers from {:?}", path.as_ref()))?;
        let answers: Self = serde_json::from_str(&content).context("Failed to parse answers JSON")?;
        answers.validate()?;
        Ok(answers)
    }

    /// Reject keys that do not name a step, so typos fail loudly instead of
    /// being silently ignored in non-interactive runs.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in &self.answers {
            if !KNOWN_STEP_IDS.contains(&key.as_str()) {
                anyhow::bail!("Unknown step '{}' in answers file", key);
            }
            if value.trim().is_empty() {
                anyhow::bail!("Answer for '{}' is empty", key);
            }
        }
        Ok(())
    }
}
