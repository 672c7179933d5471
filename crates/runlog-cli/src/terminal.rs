//! Terminal utilities for raw mode and terminal size.
//!
//! Raw mode is applied to an explicit file descriptor rather than to the
//! process's controlling terminal, so a session can be bridged to any tty
//! (including a pseudo-terminal in tests). The guard restores the saved
//! attributes on drop, and a panic hook restores them too, since release
//! builds abort on panic without running destructors.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Once};

use crossterm::terminal;
use nix::sys::termios::{self, SetArg, Termios};
use runlog_core::{RunlogError, RunlogResult};
use tracing::debug;

/// The terminal to restore if the process panics while in raw mode.
struct PanicRestore {
    id: u64,
    fd: OwnedFd,
    original: Termios,
}

static PANIC_RESTORE: Mutex<Option<PanicRestore>> = Mutex::new(None);
static PANIC_HOOK: Once = Once::new();
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_after_panic();
            previous(info);
        }));
    });
}

fn restore_after_panic() {
    // try_lock: the panic may have happened while the slot was held.
    if let Ok(slot) = PANIC_RESTORE.try_lock() {
        if let Some(saved) = slot.as_ref() {
            let _ = termios::tcsetattr(saved.fd.as_fd(), SetArg::TCSANOW, &saved.original);
        }
    }
}

/// RAII guard that restores the terminal to its original mode on drop.
pub struct RawModeGuard {
    id: u64,
    fd: OwnedFd,
    original: Termios,
}

impl RawModeGuard {
    /// Put the terminal behind `fd` into raw mode.
    ///
    /// Returns a guard that will restore the saved attributes when dropped.
    pub fn enter(fd: BorrowedFd<'_>) -> RunlogResult<Self> {
        let fd = fd.try_clone_to_owned()?;
        let original = termios::tcgetattr(&fd)
            .map_err(|e| RunlogError::Terminal(format!("failed to read terminal attributes: {e}")))?;

        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(&fd, SetArg::TCSANOW, &raw)
            .map_err(|e| RunlogError::Terminal(format!("failed to enable raw terminal mode: {e}")))?;

        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        match fd.try_clone() {
            Ok(saved_fd) => {
                install_panic_hook();
                *lock_restore_slot() = Some(PanicRestore {
                    id,
                    fd: saved_fd,
                    original: original.clone(),
                });
            }
            Err(e) => debug!("terminal will not be restored after a panic: {e}"),
        }

        debug!("raw mode enabled");
        Ok(Self { id, fd, original })
    }
}

fn lock_restore_slot() -> std::sync::MutexGuard<'static, Option<PanicRestore>> {
    match PANIC_RESTORE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Best-effort restore; nothing else can be done from a Drop impl.
        let _ = termios::tcsetattr(self.fd.as_fd(), SetArg::TCSANOW, &self.original);
        let mut slot = lock_restore_slot();
        if slot.as_ref().is_some_and(|saved| saved.id == self.id) {
            slot.take();
        }
        debug!("raw mode disabled");
    }
}

/// Get the current terminal size as (columns, rows).
///
/// Falls back to (80, 24) if the size cannot be determined.
pub fn get_terminal_size() -> (u16, u16) {
    terminal::size().unwrap_or((80, 24))
}
