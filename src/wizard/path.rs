//! Step-path resolution against automation input
//!
//! A step can be answered from the automation input directly, or indirectly
//! when the input answers a step that one of its options requires. In the
//! second case the option key becomes the step's answer.
//!
//! | Input holds            | Path for `snapshot_mode`                        |
//! |------------------------|-------------------------------------------------|
//! | `snapshot_mode`        | `[(value, snapshot_mode)]`                      |
//! | `snapshot_file`        | `[(file, snapshot_file), ("file", snapshot_mode)]` |
//! | both `file` and `url`  | conflict                                        |
//! | nothing relevant       | `[]`                                            |

use crate::config::AutomationInput;
use crate::error::{Result, WizardError};

use super::step::Step;

/// Answers to apply in order, deepest dependency first
pub type StepPath = Vec<(String, Step)>;

/// Work out which steps the automation input answers for `step`.
///
/// Returns an empty path when nothing applies. Fails with
/// [`WizardError::ConflictingArguments`] when more than one option branch
/// can be satisfied, naming the deepest step of every such branch.
pub fn resolve_step_path(step: &Step, args: &AutomationInput) -> Result<StepPath> {
    if let Some(argument) = args.get(&step.id) {
        return Ok(vec![(argument.to_string(), step.clone())]);
    }

    let mut branches: Vec<(&str, StepPath)> = Vec::new();
    for (key, required) in step.options.requirements() {
        let path = resolve_step_path(required, args)?;
        if !path.is_empty() {
            branches.push((key, path));
        }
    }

    if branches.len() > 1 {
        let steps = branches
            .iter()
            .filter_map(|(_, path)| path.first().map(|(_, s)| s.id.clone()))
            .collect();
        return Err(WizardError::ConflictingArguments { steps });
    }

    match branches.pop() {
        Some((key, mut path)) => {
            path.push((key.to_string(), step.clone()));
            Ok(path)
        }
        None => Ok(Vec::new()),
    }
}
