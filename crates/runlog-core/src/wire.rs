//! The socket protocol between the instrumented shell and the collector.
//!
//! One connection carries exactly one command: the client writes the
//! command's UTF-8 text, half-closes its write side, and waits for the
//! collector to close the connection. The collector closes only after the
//! command is in the log, so a hook that blocks on [`send`] cannot race
//! the next command past the current one.

use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use tracing::debug;

/// File name of the collector socket inside the temp directory.
pub const DEFAULT_SOCKET_NAME: &str = "runlog.sock";

/// Command text that asks the collector to discard the session.
///
/// The generated startup scripts define a shell function with this name
/// which exits the subshell with [`ABORT_EXIT_CODE`].
pub const ABORT_COMMAND: &str = "runlog_abort";

/// Exit status of a subshell that was left through [`ABORT_COMMAND`].
pub const ABORT_EXIT_CODE: u32 = 77;

/// End-of-transmission byte; ends a line-reading loop on a canonical tty.
pub const EOT: u8 = 0x04;

/// The well-known socket path shared by recording and replay sessions.
pub fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_SOCKET_NAME)
}

/// Report one command to the collector listening on `socket_path`.
///
/// Blocks until the collector has appended the command and closed the
/// connection.
pub fn send(socket_path: &Path, command: &str) -> std::io::Result<()> {
    let mut stream = UnixStream::connect(socket_path)?;
    stream.write_all(command.as_bytes())?;
    stream.shutdown(Shutdown::Write)?;

    // Drain until the collector hangs up.
    let mut sink = Vec::new();
    stream.read_to_end(&mut sink)?;
    debug!(socket = %socket_path.display(), bytes = command.len(), "command sent");
    Ok(())
}
