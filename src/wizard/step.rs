//! Wizard steps
//!
//! A [`Step`] is one question: what to ask, what to offer, how to check the
//! answer, and what to derive from it. Options that require another step to
//! be answered first are modelled by [`OptionEntry::Requires`], which makes
//! the option set a small tree of steps.

use std::fmt;
use std::sync::Arc;

use crate::config::WizardConfig;
use crate::error::{Result, ValidationError};

use super::validators::Validator;

/// Side effect run after an answer is stored: `(answer, config)`
pub type Action = Arc<dyn Fn(&str, &mut WizardConfig) -> Result<()> + Send + Sync>;

/// Description column never starts before this offset
const MIN_OPTION_PADDING: usize = 26;
/// Width option descriptions are wrapped to
const DESCRIPTION_WIDTH: usize = 60;

/// Entry of a list-style option set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    Label(String),
    /// Items shown under a `'header':` line, numbered with the rest
    Group { header: String, items: Vec<String> },
}

/// Value of a map-style option set
#[derive(Debug, Clone)]
pub enum OptionEntry {
    Description(String),
    /// Choosing this option means `step` has to be answered as well
    Requires { description: String, step: Box<Step> },
}

impl OptionEntry {
    pub fn description(&self) -> &str {
        match self {
            Self::Description(text) => text,
            Self::Requires { description, .. } => description,
        }
    }

    pub fn requires(description: impl Into<String>, step: Step) -> Self {
        Self::Requires {
            description: description.into(),
            step: Box::new(step),
        }
    }
}

/// What a step offers to choose from
#[derive(Debug, Clone, Default)]
pub enum StepOptions {
    #[default]
    FreeForm,
    List(Vec<ListEntry>),
    Map(Vec<(String, OptionEntry)>),
}

impl StepOptions {
    /// Plain labels, in order
    pub fn labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(labels.into_iter().map(|l| ListEntry::Label(l.into())).collect())
    }

    /// Keys with plain descriptions, in order
    pub fn described<I, K, D>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: Into<String>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, d)| (k.into(), OptionEntry::Description(d.into())))
                .collect(),
        )
    }

    /// Selectable values in display order; the n-th value has display index n+1.
    pub fn choices(&self) -> Vec<String> {
        match self {
            Self::FreeForm => Vec::new(),
            Self::List(entries) => entries
                .iter()
                .flat_map(|entry| match entry {
                    ListEntry::Label(label) => vec![label.clone()],
                    ListEntry::Group { items, .. } => items.clone(),
                })
                .collect(),
            Self::Map(entries) => entries.iter().map(|(key, _)| key.clone()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::FreeForm => true,
            Self::List(entries) => entries.is_empty(),
            Self::Map(entries) => entries.is_empty(),
        }
    }

    /// Branches that depend on another step
    pub fn requirements(&self) -> impl Iterator<Item = (&str, &Step)> {
        let entries = match self {
            Self::Map(entries) => entries.as_slice(),
            _ => &[],
        };
        entries.iter().filter_map(|(key, entry)| match entry {
            OptionEntry::Requires { step, .. } => Some((key.as_str(), step.as_ref())),
            OptionEntry::Description(_) => None,
        })
    }

    fn remove(&mut self, keys: &[&str]) {
        match self {
            Self::FreeForm => {}
            Self::List(entries) => {
                entries.retain(|e| !matches!(e, ListEntry::Label(l) if keys.contains(&l.as_str())));
                for entry in entries.iter_mut() {
                    if let ListEntry::Group { items, .. } = entry {
                        items.retain(|item| !keys.contains(&item.as_str()));
                    }
                }
            }
            Self::Map(entries) => entries.retain(|(key, _)| !keys.contains(&key.as_str())),
        }
    }
}

/// How answers to a step are checked
#[derive(Debug, Clone, Default)]
enum Check {
    /// Any answer goes
    #[default]
    Accept,
    /// Must be one of the current options (by key or index)
    Choices,
    Custom(Validator),
}

/// One question of the wizard
#[derive(Clone)]
pub struct Step {
    pub id: String,
    pub prompt: String,
    pub help: String,
    /// `None` means the operator has to answer
    pub default: Option<String>,
    pub options: StepOptions,
    check: Check,
    actions: Vec<Action>,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("default", &self.default)
            .field("options", &self.options)
            .field("check", &self.check)
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl Step {
    /// Free-form question accepting any answer
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            help: String::new(),
            default: None,
            options: StepOptions::FreeForm,
            check: Check::Accept,
            actions: Vec::new(),
        }
    }

    /// Question restricted to `options`
    pub fn choice(id: impl Into<String>, prompt: impl Into<String>, options: StepOptions) -> Self {
        Self {
            options,
            check: Check::Choices,
            ..Self::new(id, prompt)
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn default_answer(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.check = Check::Custom(validator);
        self
    }

    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&str, &mut WizardConfig) -> Result<()> + Send + Sync + 'static,
    {
        self.actions.push(Arc::new(action));
        self
    }

    /// Copy of this step without the given option keys.
    pub fn without_options(&self, keys: &[&str]) -> Self {
        let mut step = self.clone();
        step.options.remove(keys);
        step
    }

    pub fn validate(&self, input: &str) -> std::result::Result<String, ValidationError> {
        match &self.check {
            Check::Accept => Ok(input.to_string()),
            Check::Choices => Validator::enum_range(self.options.choices()).validate(input),
            Check::Custom(validator) => validator.validate(input),
        }
    }

    /// Store `answer` and run the post-answer actions.
    pub fn apply(&self, answer: &str, config: &mut WizardConfig) -> Result<()> {
        config.set(self.id.clone(), answer);
        for action in &self.actions {
            action(answer, config)?;
        }
        Ok(())
    }

    /// Option listing shown under the prompt. Empty when there is nothing to show.
    pub fn render_options(&self) -> String {
        let default_index = self.default.as_deref().and_then(|d| d.parse::<usize>().ok());
        let mut out = String::new();

        match &self.options {
            StepOptions::List(entries) if !entries.is_empty() => {
                let width = digits(self.options.choices().len());
                let mut index = 1;
                let mut push_item = |out: &mut String, label: &str| {
                    let marker = if default_index == Some(index) { "(default) " } else { "" };
                    out.push_str(&format!("{:>width$}. {}{}\n", index, marker, label));
                    index += 1;
                };
                for entry in entries {
                    match entry {
                        ListEntry::Label(label) => push_item(&mut out, label),
                        ListEntry::Group { header, items } => {
                            out.push_str(&format!("\n'{}':\n\n", header));
                            for item in items {
                                push_item(&mut out, item);
                            }
                            out.push('\n');
                        }
                    }
                }
            }
            StepOptions::Map(entries) if !entries.is_empty() => {
                let width = digits(entries.len());
                let longest = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
                let padding = MIN_OPTION_PADDING.max(longest + 2);
                let indent = " ".repeat(width + 4 + padding);
                for (i, (key, entry)) in entries.iter().enumerate() {
                    let index = i + 1;
                    let label = if default_index == Some(index) {
                        format!("{} (default)", key)
                    } else {
                        key.clone()
                    };
                    let description = wrap(entry.description(), DESCRIPTION_WIDTH).join(&format!("\n{}", indent));
                    out.push_str(&format!("{:>width$}. {:<padding$}  {}\n", index, label, description));
                }
            }
            StepOptions::FreeForm => {
                if let Some(default) = &self.default {
                    out.push_str(&format!("Default: {}\n", default));
                }
            }
            _ => {}
        }
        out
    }
}

fn digits(n: usize) -> usize {
    n.max(1).to_string().len()
}

/// Greedy word wrap; whitespace runs (newlines included) collapse to one space.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
