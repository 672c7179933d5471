//! `runlog send --socket PATH -- TEXT`: report one command to a running
//! collector. Invoked by the shell hook, not by users.

use std::path::Path;

use anyhow::{Context, Result};
use runlog_core::wire;

pub fn run(socket: &Path, text: &[String]) -> Result<()> {
    let command = text.join(" ");
    wire::send(socket, &command)
        .with_context(|| format!("failed to report command to {}", socket.display()))
}
