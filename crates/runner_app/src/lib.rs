//! Terminal front end for the sequential navigation runner.
pub mod commands;
pub mod config;
pub mod logging;
pub mod presenter;
pub mod tab;

pub use commands::{Command, CommandError};
pub use config::{ConfigError, RunnerConfig};
pub use logging::LogDestination;
pub use presenter::{Console, TerminalPresenter};
pub use tab::{run, Flow, Tab};
