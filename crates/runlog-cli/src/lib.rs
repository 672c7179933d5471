//! runlog-cli: terminal plumbing for runlog.
//!
//! Bridges the user's terminal to a shell running on a PTY while the
//! capture core collects the commands it runs, and replays stored shell
//! history through an expansion-only shell.

pub mod cancel_reader;
pub mod collaborators;
pub mod config;
pub mod display;
pub mod pty;
pub mod replay;
pub mod resize;
pub mod session;
pub mod terminal;

pub use replay::{expand_history, ReplayOptions};
pub use session::{Session, SessionOptions, SessionOutcome, Terminal};
