//! Colored one-line status messages on stderr.

use crossterm::style::Stylize;
use runlog_core::RunlogError;

pub fn info(message: &str) {
    eprintln!("{}", message.cyan());
}

pub fn success(message: &str) {
    eprintln!("{}", message.green());
}

pub fn error(message: &str) {
    eprintln!("{}", message.red());
}

/// Error text followed by the steps that fix it, if there are any.
pub fn describe(err: &RunlogError) -> String {
    match err.remediation() {
        Some(steps) => format!("{err}\n\n{steps}"),
        None => err.to_string(),
    }
}
