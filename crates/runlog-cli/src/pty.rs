//! PTY wrapper using portable-pty.
//!
//! Launches a prepared [`ShellCommand`] on a fresh pseudo-terminal and hands
//! out the pieces a session needs: a reader for the shell's output, the
//! single writer for its input, a resize handle, and kill/wait control.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use nix::errno::Errno;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use runlog_core::{RunlogError, RunlogResult, ShellCommand};
use tracing::{debug, info};

/// A shell running on a pseudo-terminal.
pub struct PtyProcess {
    /// Kept for resizes (Mutex because MasterPty is not Sync).
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
    child: Option<Box<dyn Child + Send + Sync>>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
    /// Owns the generated startup files for as long as the shell runs.
    _command: ShellCommand,
}

impl PtyProcess {
    /// Spawn `command` on a new PTY of the given size.
    pub fn spawn(command: ShellCommand, cols: u16, rows: u16) -> RunlogResult<Self> {
        let pair = native_pty_system()
            .openpty(pty_size(cols, rows))
            .map_err(|e| RunlogError::Pty(format!("failed to open PTY: {e}")))?;

        let mut builder = CommandBuilder::new(&command.program);
        builder.args(&command.args);
        for (key, value) in &command.env {
            builder.env(key, value);
        }
        // portable-pty defaults to $HOME; the shell should start where we are.
        if let Ok(cwd) = std::env::current_dir() {
            builder.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| RunlogError::Pty(format!("failed to spawn {}: {e}", command.program.display())))?;
        // The child holds its own copy; ours would keep the PTY open after it exits.
        drop(pair.slave);

        let pid = child.process_id();
        let killer = child.clone_killer();
        info!(program = %command.program.display(), pid, cols, rows, "PTY spawned");

        Ok(Self {
            master: Arc::new(Mutex::new(pair.master)),
            child: Some(child),
            killer,
            pid,
            _command: command,
        })
    }

    /// A new handle on the shell's output (blocking; use from a blocking task).
    pub fn reader(&self) -> RunlogResult<Box<dyn Read + Send>> {
        self.lock_master()?
            .try_clone_reader()
            .map_err(|e| RunlogError::Pty(format!("failed to clone PTY reader: {e}")))
    }

    /// The shell's input. Can be taken only once.
    pub fn take_writer(&self) -> RunlogResult<Box<dyn Write + Send>> {
        self.lock_master()?
            .take_writer()
            .map_err(|e| RunlogError::Pty(format!("failed to take PTY writer: {e}")))
    }

    pub fn resizer(&self) -> PtyResizer {
        PtyResizer {
            master: self.master.clone(),
        }
    }

    /// A kill handle usable from another task.
    pub fn killer(&self) -> Box<dyn ChildKiller + Send + Sync> {
        self.killer.clone_killer()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Kill the child process.
    pub fn kill(&mut self) -> RunlogResult<()> {
        self.killer
            .kill()
            .map_err(|e| RunlogError::Pty(format!("kill failed: {e}")))
    }

    /// Wait for the child process to exit. Returns the exit code.
    pub async fn wait(&mut self) -> RunlogResult<u32> {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| RunlogError::Pty("child already reaped".into()))?;
        let status = tokio::task::spawn_blocking(move || child.wait())
            .await
            .map_err(|e| RunlogError::Other(format!("join error: {e}")))?
            .map_err(|e| RunlogError::Pty(format!("wait error: {e}")))?;

        let code = status.exit_code();
        info!(code, "PTY child exited");
        Ok(code)
    }

    fn lock_master(&self) -> RunlogResult<std::sync::MutexGuard<'_, Box<dyn MasterPty + Send>>> {
        self.master
            .lock()
            .map_err(|_| RunlogError::Pty("PTY master lock poisoned".into()))
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        // Not waited for: kill it and reap it off-thread so dropping never blocks.
        if let Some(mut child) = self.child.take() {
            if let Err(e) = self.killer.kill() {
                debug!("kill on drop: {e}");
            }
            std::thread::spawn(move || {
                let _ = child.wait();
            });
        }
    }
}

/// Resizes the PTY from any task.
#[derive(Clone)]
pub struct PtyResizer {
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
}

impl PtyResizer {
    pub fn resize(&self, cols: u16, rows: u16) -> RunlogResult<()> {
        let master = self
            .master
            .lock()
            .map_err(|_| RunlogError::Pty("PTY master lock poisoned".into()))?;
        master
            .resize(pty_size(cols, rows))
            .map_err(|e| RunlogError::Pty(format!("PTY resize failed: {e}")))?;
        debug!(cols, rows, "PTY resized");
        Ok(())
    }

    pub fn size(&self) -> RunlogResult<(u16, u16)> {
        let master = self
            .master
            .lock()
            .map_err(|_| RunlogError::Pty("PTY master lock poisoned".into()))?;
        let size = master
            .get_size()
            .map_err(|e| RunlogError::Pty(format!("PTY size query failed: {e}")))?;
        Ok((size.cols, size.rows))
    }
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Copy `reader` into `writer` until end of input, flushing every chunk.
///
/// A PTY master reports EIO once the last slave handle is closed; that is
/// treated as end of input.
pub fn pump(reader: &mut dyn Read, writer: &mut dyn Write) -> io::Result<u64> {
    let mut buf = [0u8; 8192];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.raw_os_error() == Some(Errno::EIO as i32) => return Ok(total),
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        writer.flush()?;
        total += n as u64;
    }
}
