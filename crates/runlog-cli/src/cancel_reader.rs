//! A blocking reader over a terminal fd that another thread can interrupt.
//!
//! The reader polls its input together with the read end of a wake pipe.
//! [`Canceler::cancel`] writes to the pipe, which makes a pending (or any
//! later) read fail with [`Canceled`].

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use thiserror::Error;

/// Error payload of a read that was interrupted by [`Canceler::cancel`].
#[derive(Debug, Error)]
#[error("read canceled")]
pub struct Canceled;

/// Whether `err` came from a canceled read.
pub fn is_canceled(err: &io::Error) -> bool {
    err.get_ref().is_some_and(|inner| inner.is::<Canceled>())
}

pub struct CancelReader {
    input: File,
    wake: File,
    canceled: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct Canceler {
    wake: Arc<File>,
    canceled: Arc<AtomicBool>,
}

/// Build a cancelable reader over a duplicate of `fd`.
pub fn cancelable(fd: BorrowedFd<'_>) -> io::Result<(CancelReader, Canceler)> {
    let input = File::from(fd.try_clone_to_owned()?);
    let (wake_read, wake_write) = nix::unistd::pipe()?;
    let canceled = Arc::new(AtomicBool::new(false));

    let reader = CancelReader {
        input,
        wake: File::from(wake_read),
        canceled: canceled.clone(),
    };
    let canceler = Canceler {
        wake: Arc::new(File::from(wake_write)),
        canceled,
    };
    Ok((reader, canceler))
}

impl Read for CancelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.canceled.load(Ordering::SeqCst) {
                return Err(io::Error::other(Canceled));
            }

            let (input_ready, woken) = {
                let mut fds = [
                    PollFd::new(self.input.as_fd(), PollFlags::POLLIN),
                    PollFd::new(self.wake.as_fd(), PollFlags::POLLIN),
                ];
                match poll(&mut fds, PollTimeout::NONE) {
                    Ok(_) => {}
                    Err(Errno::EINTR) => continue,
                    Err(e) => return Err(e.into()),
                }
                let ready = |fd: &PollFd<'_>| fd.revents().is_some_and(|r| !r.is_empty());
                (ready(&fds[0]), ready(&fds[1]))
            };

            if woken {
                return Err(io::Error::other(Canceled));
            }
            if input_ready {
                return self.input.read(buf);
            }
        }
    }
}

impl Canceler {
    /// Interrupt the reader. Idempotent.
    pub fn cancel(&self) {
        if !self.canceled.swap(true, Ordering::SeqCst) {
            let _ = (&*self.wake).write(&[1]);
        }
    }

    /// A handle that cancels when dropped, so no return path leaves the
    /// reader parked on its input.
    pub fn cancel_on_drop(self) -> CancelOnDrop {
        CancelOnDrop(self)
    }
}

pub struct CancelOnDrop(Canceler);

impl CancelOnDrop {
    pub fn cancel(&self) {
        self.0.cancel();
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
