//! Application layer: typed commands, the shell that dispatches them and
//! the view state used by the TUI.

mod command;
mod model;

pub use command::{Command, Outcome, Shell};
pub use model::{App, Focus, InputMode};
