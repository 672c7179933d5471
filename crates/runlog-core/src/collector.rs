//! Command collector: a unix socket server that turns one connection per
//! command into an ordered, append-only log.
//!
//! The socket file doubles as the single-session lock. Binding fails with
//! [`RunlogError::AlreadyRunning`] when anything already exists at the path,
//! and the file is removed again on [`Collector::close`].

use std::os::unix::net::UnixListener as StdUnixListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::RecordedCommand;
use crate::error::{RunlogError, RunlogResult};
use crate::wire::ABORT_COMMAND;

/// Callback invoked for every command right after it lands in the log.
///
/// Runs on the connection's task and holds up that shell's hook, so it
/// should return quickly.
pub type CommandRecordedHook = Arc<dyn Fn(&RecordedCommand) + Send + Sync>;

/// Options accepted by [`Collector::bind`].
#[derive(Clone, Default)]
pub struct CollectorOptions {
    pub on_command_recorded: Option<CommandRecordedHook>,
    /// Accepted for compatibility and has no effect.
    ///
    /// The hook reports a command before it runs, so no exit status ever
    /// reaches the collector and every command is kept. Setting the flag
    /// only logs a warning.
    pub ignore_errors: bool,
}

impl CollectorOptions {
    pub fn on_command_recorded<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RecordedCommand) + Send + Sync + 'static,
    {
        self.on_command_recorded = Some(Arc::new(hook));
        self
    }

    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }
}

/// Shared state touched by connection handlers.
struct CommandLog {
    entries: Mutex<Vec<RecordedCommand>>,
    hook: Option<CommandRecordedHook>,
    aborted: AtomicBool,
}

impl CommandLog {
    fn record(&self, text: String) {
        if text.trim() == ABORT_COMMAND {
            info!("abort requested from the recorded shell");
            self.aborted.store(true, Ordering::SeqCst);
            return;
        }

        let entry = {
            let mut entries = match self.entries.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let entry = RecordedCommand::new(entries.len(), text);
            entries.push(entry.clone());
            entry
        };
        debug!(index = entry.index, "command recorded");

        if let Some(hook) = &self.hook {
            hook(&entry);
        }
    }

    fn snapshot(&self) -> Vec<RecordedCommand> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// The collector bound to one socket path.
pub struct Collector {
    socket_path: PathBuf,
    listener: Mutex<Option<StdUnixListener>>,
    log: Arc<CommandLog>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl Collector {
    /// Claim `socket_path` and start listening on it.
    ///
    /// Does not accept connections until [`Collector::serve`] runs.
    pub fn bind(socket_path: impl AsRef<Path>, options: CollectorOptions) -> RunlogResult<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();
        if std::fs::symlink_metadata(&socket_path).is_ok() {
            return Err(RunlogError::AlreadyRunning { path: socket_path });
        }

        // Another session may claim the path between the check and the bind.
        let listener = match StdUnixListener::bind(&socket_path) {
            Ok(listener) => listener,
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                return Err(RunlogError::AlreadyRunning { path: socket_path });
            }
            Err(e) => return Err(e.into()),
        };
        listener.set_nonblocking(true)?;
        info!(path = %socket_path.display(), "collector listening");

        if options.ignore_errors {
            warn!("ignore-errors has no effect: commands are reported before they run, so every command is kept");
        }

        Ok(Self {
            socket_path,
            listener: Mutex::new(Some(listener)),
            log: Arc::new(CommandLog {
                entries: Mutex::new(Vec::new()),
                hook: options.on_command_recorded,
                aborted: AtomicBool::new(false),
            }),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until [`Collector::close`] is called.
    ///
    /// Returns `Ok(())` after a deliberate close. Returns an error only when
    /// the listener cannot be driven at all (for example when `serve` is
    /// called twice).
    pub async fn serve(&self) -> RunlogResult<()> {
        let std_listener = {
            let mut slot = match self.listener.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.take()
        }
        .ok_or_else(|| RunlogError::Other("collector is already serving".into()))?;

        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let listener = UnixListener::from_std(std_listener)?;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("collector accept loop stopped");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let log = self.log.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, log).await;
                        });
                    }
                    Err(e) => {
                        if self.closed.load(Ordering::SeqCst) {
                            return Ok(());
                        }
                        warn!(error = %e, "failed to accept collector connection");
                    }
                }
            }
        }
    }

    /// Snapshot of the log so far, in arrival order.
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.log.snapshot()
    }

    /// Number of commands in the log.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the recorded shell asked for the session to be discarded.
    pub fn is_aborted(&self) -> bool {
        self.log.aborted.load(Ordering::SeqCst)
    }

    /// Stop serving and release the socket file. Safe to call repeatedly.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();

        // Dropping an unserved listener closes it.
        if let Ok(mut slot) = self.listener.lock() {
            slot.take();
        }

        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => debug!(path = %self.socket_path.display(), "socket removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.socket_path.display(), error = %e, "failed to remove socket"),
        }
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read one command until the peer half-closes, record it, then hang up.
async fn handle_connection(mut stream: UnixStream, log: Arc<CommandLog>) {
    let mut bytes = Vec::new();
    if let Err(e) = stream.read_to_end(&mut bytes).await {
        warn!(error = %e, "failed to read from collector connection");
        return;
    }

    log.record(String::from_utf8_lossy(&bytes).into_owned());

    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "collector connection already closed by peer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    async fn send(path: &Path, text: &str) {
        let path = path.to_path_buf();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || wire::send(&path, &text))
            .await
            .unwrap()
            .unwrap();
    }

    fn start(collector: &Arc<Collector>) -> tokio::task::JoinHandle<RunlogResult<()>> {
        let collector = collector.clone();
        tokio::spawn(async move { collector.serve().await })
    }

    #[tokio::test]
    async fn records_commands_in_send_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sock");
        let collector = Arc::new(Collector::bind(&path, CollectorOptions::default()).unwrap());
        let serving = start(&collector);

        for cmd in ["ls -la", "echo hi", "git status", "echo hi"] {
            send(&path, cmd).await;
        }

        let texts: Vec<_> = collector.commands().into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["ls -la", "echo hi", "git status", "echo hi"]);
        let indices: Vec<_> = collector.commands().into_iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);

        collector.close();
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn second_bind_on_same_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sock");
        let first = Collector::bind(&path, CollectorOptions::default()).unwrap();

        let err = Collector::bind(&path, CollectorOptions::default()).err().unwrap();
        assert!(matches!(err, RunlogError::AlreadyRunning { .. }));

        // Any filesystem object blocks the path, not only sockets.
        first.close();
        std::fs::write(&path, b"stale").unwrap();
        let err = Collector::bind(&path, CollectorOptions::default()).err().unwrap();
        assert!(matches!(err, RunlogError::AlreadyRunning { .. }));
    }

    #[test]
    fn simultaneous_binds_leave_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sock");
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    Collector::bind(&path, CollectorOptions::default())
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in &results {
            if let Err(e) = result {
                assert!(matches!(e, RunlogError::AlreadyRunning { .. }), "unexpected error: {e}");
            }
        }
    }

    #[tokio::test]
    async fn close_is_idempotent_and_releases_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sock");
        let collector = Arc::new(Collector::bind(&path, CollectorOptions::default()).unwrap());
        let serving = start(&collector);
        tokio::task::yield_now().await;

        collector.close();
        collector.close();
        let result = tokio::time::timeout(Duration::from_secs(5), serving)
            .await
            .expect("serve should return after close");
        assert!(result.unwrap().is_ok());
        assert!(!path.exists());

        // The path is free again.
        let again = Collector::bind(&path, CollectorOptions::default()).unwrap();
        again.close();
    }

    #[tokio::test]
    async fn serve_after_close_reports_missing_listener() {
        let dir = tempfile::tempdir().unwrap();
        let collector = Collector::bind(dir.path().join("c.sock"), CollectorOptions::default()).unwrap();
        collector.close();
        // The listener was dropped by close, so serve reports it as gone.
        assert!(collector.serve().await.is_err());
    }

    #[tokio::test]
    async fn serving_twice_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let collector = Arc::new(
            Collector::bind(dir.path().join("c.sock"), CollectorOptions::default()).unwrap(),
        );
        let serving = start(&collector);
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(collector.serve().await.is_err());
        collector.close();
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn hook_sees_every_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sock");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let options = {
            let seen = seen.clone();
            let calls = calls.clone();
            CollectorOptions::default().on_command_recorded(move |cmd| {
                calls.fetch_add(1, Ordering::SeqCst);
                seen.lock().unwrap().push(cmd.text.clone());
            })
        };
        let collector = Arc::new(Collector::bind(&path, options).unwrap());
        let serving = start(&collector);

        send(&path, "make build").await;
        send(&path, "make test").await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["make build", "make test"]);

        collector.close();
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn abort_command_marks_log_without_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sock");
        let collector = Arc::new(Collector::bind(&path, CollectorOptions::default()).unwrap());
        let serving = start(&collector);

        send(&path, "ls").await;
        assert!(!collector.is_aborted());
        send(&path, ABORT_COMMAND).await;

        assert!(collector.is_aborted());
        assert_eq!(collector.len(), 1);

        collector.close();
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn ignore_errors_keeps_every_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sock");
        let collector = Arc::new(
            Collector::bind(&path, CollectorOptions::default().ignore_errors(true)).unwrap(),
        );
        let serving = start(&collector);

        send(&path, "false").await;
        send(&path, "true").await;
        assert_eq!(collector.len(), 2);

        collector.close();
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn snapshot_is_safe_while_serving() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sock");
        let collector = Arc::new(Collector::bind(&path, CollectorOptions::default()).unwrap());
        let serving = start(&collector);

        assert!(collector.is_empty());
        send(&path, "pwd").await;
        let before = collector.commands();
        send(&path, "whoami").await;

        // Earlier snapshots are unaffected by later appends.
        assert_eq!(before.len(), 1);
        assert_eq!(collector.len(), 2);

        collector.close();
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn multibyte_text_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sock");
        let collector = Arc::new(Collector::bind(&path, CollectorOptions::default()).unwrap());
        let serving = start(&collector);

        send(&path, "echo 'héllo wörld' | grep ö").await;
        assert_eq!(collector.commands()[0].text, "echo 'héllo wörld' | grep ö");

        collector.close();
        serving.await.unwrap().unwrap();
    }
}
