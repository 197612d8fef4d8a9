//! Line-oriented commands read from standard input.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Load a page in the tab, as if typed into the address bar.
    Open(String),
    Reload,
    Start,
    Pause,
    Resume,
    Restart,
    Cancel,
    Close,
    Upload(PathBuf),
    Clear,
    Move { x: f64, y: f64 },
    Enable,
    Disable,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("`{0}` is not a number")]
    InvalidNumber(String),
}

pub const HELP: &str = "\
open <url>      load a page
reload          load the current page again
upload <file>   upload a CSV export
clear           remove the uploaded list
start | pause | resume | restart | cancel | close
move <x> <y>    move the panel
enable | disable   flip the runner setting
status          show the current state
quit";

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match word.to_ascii_lowercase().as_str() {
        "" => return Ok(None),
        "open" | "goto" => Command::Open(required(rest, "open")?.to_string()),
        "reload" => Command::Reload,
        "start" => Command::Start,
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "restart" => Command::Restart,
        "cancel" => Command::Cancel,
        "close" => Command::Close,
        "upload" => Command::Upload(PathBuf::from(required(rest, "upload")?)),
        "clear" => Command::Clear,
        "move" => {
            let mut parts = rest.split_whitespace();
            let x = number(parts.next(), "move")?;
            let y = number(parts.next(), "move")?;
            Command::Move { x, y }
        }
        "enable" => Command::Enable,
        "disable" => Command::Disable,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn required<'a>(rest: &'a str, name: &'static str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument(name))
    } else {
        Ok(rest)
    }
}

fn number(raw: Option<&str>, name: &'static str) -> Result<f64, CommandError> {
    let raw = raw.ok_or(CommandError::MissingArgument(name))?;
    raw.parse::<f64>()
        .map_err(|_| CommandError::InvalidNumber(raw.to_string()))
}
