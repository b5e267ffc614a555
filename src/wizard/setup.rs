//! Setup driver
//!
//! [`Setup`] owns the configuration map of one run and is the only writer to
//! it. Each query either replays answers from the automation input, falls
//! back to a default, or asks the operator through a [`Prompter`].

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use tracing::{debug, info, warn};

use crate::config::{AutomationInput, WizardConfig};
use crate::error::{CancelReason, Result, WizardError};

use super::path::{resolve_step_path, StepPath};
use super::step::Step;

/// Operator-facing input and output
pub trait Prompter {
    /// Print a block of text.
    fn show(&mut self, text: &str);

    /// Print `prompt` and read one line. `None` means input was closed.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Prompter on stdin/stdout
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn show(&mut self, text: &str) {
        println!("{}", text);
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;
        drop(stdout);

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            Ok(None)
        } else {
            Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
        }
    }
}

/// Prompter fed from a fixed list of lines, recording everything it shows.
///
/// Used to drive the wizard in tests and for dry runs from a script.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    lines: VecDeque<String>,
    transcript: String,
}

impl ScriptedPrompter {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            transcript: String::new(),
        }
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }
}

impl Prompter for ScriptedPrompter {
    fn show(&mut self, text: &str) {
        self.transcript.push_str(text);
        self.transcript.push('\n');
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.transcript.push_str(prompt);
        let line = self.lines.pop_front();
        if let Some(line) = &line {
            self.transcript.push_str(line);
            self.transcript.push('\n');
        }
        Ok(line)
    }
}

/// Drives steps against one configuration map
pub struct Setup<P: Prompter> {
    config: WizardConfig,
    args: AutomationInput,
    prompter: P,
}

impl<P: Prompter> Setup<P> {
    pub fn new(args: AutomationInput, prompter: P) -> Self {
        Self::with_config(WizardConfig::new(), args, prompter)
    }

    pub fn with_config(config: WizardConfig, args: AutomationInput, prompter: P) -> Self {
        Self {
            config,
            args,
            prompter,
        }
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    /// Direct write access for derived fields set outside of step actions.
    pub fn config_mut(&mut self) -> &mut WizardConfig {
        &mut self.config
    }

    pub fn into_config(self) -> WizardConfig {
        self.config
    }

    pub fn args(&self) -> &AutomationInput {
        &self.args
    }

    pub fn non_interactive(&self) -> bool {
        self.args.non_interactive()
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    /// Print to the operator and record it in the log.
    pub fn notice(&mut self, text: &str) {
        info!("{}", text);
        self.prompter.show(text);
    }

    /// Print to the operator only.
    pub fn say(&mut self, text: &str) {
        self.prompter.show(text);
    }

    /// Ask `step` unless it already has an answer.
    pub fn ensure_step(&mut self, step: &Step) -> Result<()> {
        if self.config.contains(&step.id) {
            debug!(step = %step.id, "Step already answered, skipping");
            return Ok(());
        }
        self.query_step(step)
    }

    /// Ask `step`, overwriting any earlier answer.
    pub fn query_step(&mut self, step: &Step) -> Result<()> {
        let path = resolve_step_path(step, &self.args)?;
        if !path.is_empty() {
            return self.apply_path(path);
        }

        let value = if self.args.non_interactive() {
            match &step.default {
                Some(default) => {
                    debug!(step = %step.id, %default, "Using default in non-interactive mode");
                    let value = step.validate(default)?;
                    step.apply(&value, &mut self.config)?;
                    value
                }
                None => return Err(WizardError::missing_argument(&step.id)),
            }
        } else {
            self.interactive_query(step)?
        };
        self.query_required(step, &value)
    }

    /// Ask the step the chosen option depends on, if any.
    fn query_required(&mut self, step: &Step, answer: &str) -> Result<()> {
        match required_step(step, answer) {
            Some(required) => {
                debug!(step = %step.id, required = %required.id, "Option requires another step");
                self.query_step(required)
            }
            None => Ok(()),
        }
    }

    /// Validate the whole path before storing anything, so a bad argument
    /// deep in the path leaves the configuration untouched.
    ///
    /// When the input answers a step directly, whatever it also answers for
    /// the step the chosen option requires is validated along with it.
    fn apply_path(&mut self, path: StepPath) -> Result<()> {
        let mut segments: Vec<Vec<(String, Step)>> = Vec::new();
        let mut unanswered = None;
        let mut next = Some(path);
        while let Some(path) = next.take() {
            let mut segment = Vec::with_capacity(path.len());
            for (answer, step) in path {
                let value = step.validate(&answer).map_err(|e| {
                    WizardError::validation(format!("argument for '{}': {}", step.id, e))
                })?;
                segment.push((value, step));
            }
            if let [(value, step)] = segment.as_slice() {
                if let Some(required) = required_step(step, value) {
                    let dependent = resolve_step_path(required, &self.args)?;
                    if dependent.is_empty() {
                        unanswered = Some(required.clone());
                    } else {
                        next = Some(dependent);
                    }
                }
            }
            segments.push(segment);
        }

        for (value, step) in segments.into_iter().rev().flatten() {
            debug!(step = %step.id, "Answered from automation input");
            step.apply(&value, &mut self.config)?;
        }
        match unanswered {
            Some(required) => self.query_step(&required),
            None => Ok(()),
        }
    }

    fn interactive_query(&mut self, step: &Step) -> Result<String> {
        loop {
            self.prompter.show(&step.prompt);
            let options = step.render_options();
            if !options.is_empty() {
                self.prompter.show(options.trim_end_matches('\n'));
            }

            let line = self
                .prompter
                .read_line("> ")?
                .ok_or(WizardError::Cancelled(CancelReason::EndOfInput))?;
            let answer = line.trim();

            match answer.to_lowercase().as_str() {
                "quit" | "exit" => return Err(WizardError::Cancelled(CancelReason::Quit)),
                "help" | "?" => {
                    self.prompter.show(&step.help);
                    self.prompter.show("");
                    continue;
                }
                _ => {}
            }

            let answer = match (&step.default, answer.is_empty()) {
                (Some(default), true) => default.as_str(),
                _ => answer,
            };

            match step.validate(answer) {
                Ok(value) => {
                    step.apply(&value, &mut self.config)?;
                    return Ok(value);
                }
                Err(err) => {
                    warn!(step = %step.id, error = %err, "Rejected answer");
                    self.prompter.show(&err.0);
                }
            }
        }
    }
}

/// Step required by the option `answer` picks on `step`
fn required_step<'a>(step: &'a Step, answer: &str) -> Option<&'a Step> {
    step.options
        .requirements()
        .find(|(key, _)| *key == answer)
        .map(|(_, required)| required)
}
