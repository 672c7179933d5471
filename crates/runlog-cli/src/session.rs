//! Interactive recording session.
//!
//! A [`Session`] runs the user's shell on a PTY bridged to a real terminal
//! while a [`Collector`] gathers every command the shell's hook reports.
//!
//! Startup order: setup check, collector, shell on the PTY, resize
//! forwarding, raw mode, input forwarding. Output is copied until the
//! shell closes its terminal. Teardown then cancels the session scope
//! (which kills the shell if it is still around), reaps the shell,
//! interrupts the input reader, reads the command log, stops resize
//! forwarding and closes the collector. The terminal is restored last.

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, OwnedFd};
use std::path::PathBuf;
use std::sync::Arc;

use runlog_core::{
    Collector, CollectorOptions, RecordedCommand, RunlogResult, SetupChecker, ShellHook,
    ABORT_EXIT_CODE,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancel_reader::{self, is_canceled};
use crate::pty::{pump, PtyProcess};
use crate::resize::{ResizeForwarder, SizeSource};
use crate::terminal::{self, RawModeGuard};

/// The terminal a session is bridged to.
pub struct Terminal {
    /// Keystrokes are read from here; raw mode is applied to it.
    input: OwnedFd,
    /// Shell output goes here.
    output: Box<dyn Write + Send>,
    size: SizeSource,
}

impl Terminal {
    pub fn new(input: OwnedFd, output: Box<dyn Write + Send>, size: SizeSource) -> Self {
        Self {
            input,
            output,
            size,
        }
    }

    /// The process's own stdin and stdout.
    pub fn stdio() -> RunlogResult<Self> {
        let input = io::stdin().as_fd().try_clone_to_owned()?;
        Ok(Self::new(
            input,
            Box::new(io::stdout()),
            Arc::new(terminal::get_terminal_size),
        ))
    }
}

/// How a recording ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Recorded(Vec<RecordedCommand>),
    /// The user left through `runlog_abort`; the commands are still
    /// returned but should not be exported.
    Aborted(Vec<RecordedCommand>),
}

impl SessionOutcome {
    pub fn commands(&self) -> &[RecordedCommand] {
        match self {
            SessionOutcome::Recorded(c) | SessionOutcome::Aborted(c) => c,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, SessionOutcome::Aborted(_))
    }
}

pub struct SessionOptions {
    pub socket_path: PathBuf,
    pub collector: CollectorOptions,
}

impl SessionOptions {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            collector: CollectorOptions::default(),
        }
    }

    pub fn with_collector(mut self, collector: CollectorOptions) -> Self {
        self.collector = collector;
        self
    }
}

pub struct Session<'a> {
    shell: &'a dyn ShellHook,
    checker: &'a dyn SetupChecker,
    options: SessionOptions,
}

impl<'a> Session<'a> {
    pub fn new(shell: &'a dyn ShellHook, checker: &'a dyn SetupChecker, options: SessionOptions) -> Self {
        Self {
            shell,
            checker,
            options,
        }
    }

    /// Run one recording session to completion.
    pub async fn record(self, terminal: Terminal) -> RunlogResult<SessionOutcome> {
        self.checker.check_setup()?;

        let collector = Arc::new(Collector::bind(
            &self.options.socket_path,
            self.options.collector.clone(),
        )?);
        let scope = CancellationToken::new();

        let serving = {
            let collector = collector.clone();
            let scope = scope.clone();
            tokio::spawn(async move {
                if let Err(e) = collector.serve().await {
                    warn!("collector stopped: {e}");
                }
                // A collector that stops serving ends the session.
                scope.cancel();
            })
        };

        let mut raw_mode = None;
        let result = self
            .run_shell(&collector, &scope, terminal, &mut raw_mode)
            .await;

        scope.cancel();
        collector.close();
        let _ = serving.await;
        drop(raw_mode);

        let outcome = result?;
        info!(
            commands = outcome.commands().len(),
            aborted = outcome.is_aborted(),
            "recording finished"
        );
        Ok(outcome)
    }

    async fn run_shell(
        &self,
        collector: &Collector,
        scope: &CancellationToken,
        terminal: Terminal,
        raw_mode: &mut Option<RawModeGuard>,
    ) -> RunlogResult<SessionOutcome> {
        let Terminal {
            input,
            mut output,
            size,
        } = terminal;

        let (cols, rows) = size();
        let command = self.shell.spawn(collector.socket_path())?;
        let mut process = PtyProcess::spawn(command, cols, rows)?;
        debug!(pid = process.pid(), shell = %self.shell.kind(), "shell started");

        let resize = ResizeForwarder::start(process.resizer(), size, scope)?;

        let killing = {
            let mut killer = process.killer();
            let scope = scope.clone();
            tokio::spawn(async move {
                scope.cancelled().await;
                if let Err(e) = killer.kill() {
                    debug!("kill after cancel: {e}");
                }
            })
        };

        *raw_mode = Some(RawModeGuard::enter(input.as_fd())?);

        let (reader, canceler) = cancel_reader::cancelable(input.as_fd())?;
        let canceler = canceler.cancel_on_drop();
        let pty_writer = process.take_writer()?;
        let forwarding = tokio::task::spawn_blocking(move || forward_input(reader, pty_writer));

        let mut pty_reader = process.reader()?;
        match tokio::task::spawn_blocking(move || pump(&mut pty_reader, &mut *output)).await {
            Ok(Ok(bytes)) => debug!(bytes, "shell output closed"),
            Ok(Err(e)) => warn!("shell output copy failed: {e}"),
            Err(e) => warn!("shell output task failed: {e}"),
        }

        scope.cancel();
        let status = process.wait().await?;

        canceler.cancel();
        match forwarding.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("input forwarding ended: {e}"),
            Err(e) => warn!("input forwarding task failed: {e}"),
        }

        let commands = collector.commands();
        let aborted = collector.is_aborted() || status == ABORT_EXIT_CODE;

        resize.stop().await;
        let _ = killing.await;

        if aborted {
            Ok(SessionOutcome::Aborted(commands))
        } else {
            Ok(SessionOutcome::Recorded(commands))
        }
    }
}

/// Copy keystrokes into the shell until the reader is canceled or hits
/// end of input.
fn forward_input(mut reader: impl Read, mut writer: Box<dyn Write + Send>) -> io::Result<()> {
    match pump(&mut reader, &mut writer) {
        Ok(_) => Ok(()),
        Err(e) if is_canceled(&e) => Ok(()),
        Err(e) => Err(e),
    }
}

impl From<SessionOutcome> for Vec<RecordedCommand> {
    fn from(outcome: SessionOutcome) -> Self {
        match outcome {
            SessionOutcome::Recorded(c) | SessionOutcome::Aborted(c) => c,
        }
    }
}
