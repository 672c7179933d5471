use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::shell::ShellKind;

/// Errors produced by the capture core.
#[derive(Debug, Error)]
pub enum RunlogError {
    #[error(
        "failed to start recording session: concurrent recording sessions are not supported yet ({})",
        path.display()
    )]
    AlreadyRunning { path: PathBuf },

    #[error("your {shell} shell is not configured to use runlog")]
    HookNotInstalled { shell: ShellKind },

    #[error("unsupported shell: {0}")]
    UnsupportedShell(String),

    #[error("pty error: {0}")]
    Pty(String),

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error(
        "history replay timed out after {}s: expanded {received} of {expected} commands",
        waited.as_secs()
    )]
    ReplayTimedOut {
        expected: usize,
        received: usize,
        waited: Duration,
    },

    #[error("history expander exited with status {status} after {received} of {expected} commands")]
    ExpanderExited {
        status: u32,
        expected: usize,
        received: usize,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl RunlogError {
    /// User-facing remediation steps, when the error is something the user
    /// can fix themselves.
    pub fn remediation(&self) -> Option<String> {
        match self {
            RunlogError::HookNotInstalled { shell } => Some(shell.remediation()),
            RunlogError::UnsupportedShell(name) => Some(format!(
                "runlog supports bash and zsh. Set $SHELL or the `shell` key in \
                 ~/.runlog/config.toml to one of them (found: {name})."
            )),
            RunlogError::AlreadyRunning { path } => Some(format!(
                "Finish the other recording first. If none is running, remove the stale socket:\n\n> rm {}",
                path.display()
            )),
            _ => None,
        }
    }
}

pub type RunlogResult<T> = Result<T, RunlogError>;
