//! Window-size propagation from the real terminal to the session PTY.

use std::sync::Arc;

use runlog_core::RunlogResult;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pty::PtyResizer;

/// Reports the real terminal's current size as (columns, rows).
pub type SizeSource = Arc<dyn Fn() -> (u16, u16) + Send + Sync>;

/// Forwards SIGWINCH-driven size changes to a PTY until stopped.
///
/// One task listens for window-change signals and queues the new size;
/// a second task applies queued sizes to the PTY. The current size is
/// queued once at start.
pub struct ResizeForwarder {
    stop: CancellationToken,
    listener: JoinHandle<()>,
    applier: JoinHandle<()>,
}

impl ResizeForwarder {
    /// Start forwarding. Stops on [`ResizeForwarder::stop`] or when `scope`
    /// is cancelled.
    pub fn start(
        resizer: PtyResizer,
        size: SizeSource,
        scope: &CancellationToken,
    ) -> RunlogResult<Self> {
        let stop = scope.child_token();
        let mut winch = signal(SignalKind::window_change())?;
        let (tx_resize, mut rx_resize) = mpsc::channel::<(u16, u16)>(8);

        // A full queue already holds a pending resize; dropping this one is fine.
        let _ = tx_resize.try_send(size());

        let listener = {
            let stop = stop.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        received = winch.recv() => {
                            if received.is_none() {
                                break;
                            }
                            let _ = tx_resize.try_send(size());
                        }
                    }
                }
            })
        };

        let applier = {
            let stop = stop.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        next = rx_resize.recv() => {
                            let Some((cols, rows)) = next else { break };
                            if let Err(e) = resizer.resize(cols, rows) {
                                warn!("failed to propagate window size: {e}");
                            }
                        }
                    }
                }
            })
        };

        debug!("resize forwarding started");
        Ok(Self {
            stop,
            listener,
            applier,
        })
    }

    /// Stop both tasks and wait for them to finish.
    pub async fn stop(self) {
        self.stop.cancel();
        let _ = self.listener.await;
        let _ = self.applier.await;
        debug!("resize forwarding stopped");
    }
}
