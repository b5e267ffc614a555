//! Wizard engine
//!
//! - `validators` - answer checks and their combinators
//! - `step` - questions, option trees, option rendering
//! - `path` - answering steps from automation input
//! - `setup` - the driver that owns the configuration map

pub mod path;
pub mod setup;
pub mod step;
pub mod validators;

pub use path::{resolve_step_path, StepPath};
pub use setup::{Prompter, ScriptedPrompter, Setup, TerminalPrompter};
pub use step::{Action, ListEntry, OptionEntry, Step, StepOptions};
pub use validators::Validator;
