//! runlog-core: capture core for runlog.
//!
//! Provides the command collector that listens on the session socket, the
//! one-command-per-connection wire client used by shell hooks, and the
//! per-shell startup script provisioning that wires those hooks up.

pub mod collector;
pub mod command;
pub mod error;
pub mod setup;
pub mod shell;
pub mod wire;

// Re-export commonly used items at crate root.
pub use collector::{Collector, CollectorOptions, CommandRecordedHook};
pub use command::RecordedCommand;
pub use error::{RunlogError, RunlogResult};
pub use setup::{RcFileSetupChecker, SetupChecker};
pub use shell::{ShellCommand, ShellContext, ShellHook, ShellKind};
pub use wire::{default_socket_path, ABORT_COMMAND, ABORT_EXIT_CODE, EOT};
