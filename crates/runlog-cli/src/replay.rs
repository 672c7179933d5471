//! History replay: expand aliases in previously run commands without
//! running them again.
//!
//! The raw history lines are typed into a shell started in expansion mode.
//! That shell reads each line, reports its alias-expanded form to a
//! [`Collector`], and exits on end-of-file. The collector log is the result.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use runlog_core::shell::NOT_CONFIGURED_MESSAGE;
use runlog_core::{
    command, Collector, CollectorOptions, RunlogError, RunlogResult, ShellHook, ABORT_COMMAND, EOT,
};
use tracing::{debug, info};

use crate::pty::{pump, PtyProcess};

/// Shell output kept for diagnosing an expander that exits early.
const OUTPUT_TAIL: usize = 4096;

/// How long the output may stay open once the shell is done or killed.
/// A background job can hold the terminal long after the shell is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub socket_path: PathBuf,
    /// Give up when the shell has not reported every line by then.
    pub timeout: Duration,
    /// How often the collector's command count is checked.
    pub poll_interval: Duration,
}

impl ReplayOptions {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Expand `lines` through `shell` and return the expanded commands in
/// input order. Blank lines and `runlog_abort` are dropped, and multi-line
/// entries are joined into a single line first.
pub async fn expand_history(
    shell: &dyn ShellHook,
    lines: &[String],
    options: &ReplayOptions,
) -> RunlogResult<Vec<String>> {
    let lines: Vec<String> = lines
        .iter()
        .map(|line| single_line(line))
        .filter(|line| !line.trim().is_empty() && line.trim() != ABORT_COMMAND)
        .collect();
    if lines.is_empty() {
        return Ok(Vec::new());
    }
    debug!(count = lines.len(), "expanding history");

    let collector = Arc::new(Collector::bind(&options.socket_path, CollectorOptions::default())?);
    let serving = {
        let collector = collector.clone();
        tokio::spawn(async move { collector.serve().await })
    };

    let result = run_expander(shell, &collector, lines, options).await;

    collector.close();
    match serving.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("collector stopped: {e}"),
        Err(e) => debug!("collector task failed: {e}"),
    }
    result
}

async fn run_expander(
    shell: &dyn ShellHook,
    collector: &Collector,
    lines: Vec<String>,
    options: &ReplayOptions,
) -> RunlogResult<Vec<String>> {
    let expected = lines.len();
    let command = shell.spawn_history_expander(collector.socket_path())?;
    let mut process = PtyProcess::spawn(command, 80, 24)?;

    let mut reader = process.reader()?;
    let mut draining = tokio::task::spawn_blocking(move || {
        let mut tail = TailBuffer::new(OUTPUT_TAIL);
        let _ = pump(&mut reader, &mut tail);
        tail.into_string()
    });

    // The tty input queue is bounded, so feeding can block until the shell reads.
    let writer = process.take_writer()?;
    let feeding = tokio::task::spawn_blocking(move || feed(writer, &lines));

    let waited = wait_for(collector, expected, &draining, options).await;

    if waited.is_err() {
        let _ = process.kill();
    }
    let output = match tokio::time::timeout(DRAIN_GRACE, &mut draining).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            debug!("shell output still open after the shell finished");
            String::new()
        }
    };
    let _ = process.kill();
    let status = process.wait().await?;
    match tokio::time::timeout(DRAIN_GRACE, feeding).await {
        Ok(Ok(Ok(_writer))) => {}
        Ok(Ok(Err(e))) => debug!("feeding history failed: {e}"),
        Ok(Err(e)) => debug!("feeding task failed: {e}"),
        Err(_) => debug!("shell input still blocked after the shell finished"),
    }

    let received = collector.len();
    match waited {
        Err(waited) => Err(RunlogError::ReplayTimedOut {
            expected,
            received,
            waited,
        }),
        Ok(()) if received < expected => {
            debug!(status, output = %output, "history expander exited early");
            if output.contains(NOT_CONFIGURED_MESSAGE) {
                return Err(RunlogError::HookNotInstalled { shell: shell.kind() });
            }
            Err(RunlogError::ExpanderExited {
                status,
                expected,
                received,
            })
        }
        Ok(()) => {
            let expanded = command::texts(&collector.commands());
            info!(count = expanded.len(), "history expanded");
            Ok(expanded)
        }
    }
}

/// Type every line followed by end-of-transmission. Returns the writer so
/// that the terminal stays open until the caller is done with the shell.
fn feed(mut writer: Box<dyn Write + Send>, lines: &[String]) -> io::Result<Box<dyn Write + Send>> {
    for line in lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.write_all(&[EOT])?;
    writer.flush()?;
    Ok(writer)
}

/// Poll until the collector holds `expected` commands. Returns early (with
/// `Ok`) if the shell's output closes first, and `Err(elapsed)` on timeout.
async fn wait_for<T>(
    collector: &Collector,
    expected: usize,
    shell_output: &tokio::task::JoinHandle<T>,
    options: &ReplayOptions,
) -> Result<(), Duration> {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(options.poll_interval);
    loop {
        ticker.tick().await;
        let processed = collector.len();
        if processed >= expected {
            return Ok(());
        }
        // Every reported command is acknowledged before the shell moves on,
        // so nothing else is coming once the shell is gone.
        if shell_output.is_finished() {
            return Ok(());
        }
        if started.elapsed() >= options.timeout {
            return Err(started.elapsed());
        }
        debug!(processed, total = expected, "waiting for history expansion");
    }
}

/// Collapse a multi-line history entry into one line the expander can read.
///
/// Backslash continuations become a space. Other line breaks become `; `,
/// or a space after a keyword or operator that already expects more input.
pub fn single_line(entry: &str) -> String {
    if !entry.contains('\n') {
        return entry.to_string();
    }
    let entry = entry.replace("\\\n", " ");
    let mut out = String::with_capacity(entry.len());
    for (i, part) in entry.split('\n').map(str::trim).filter(|p| !p.is_empty()).enumerate() {
        if i > 0 {
            if continues(&out) {
                out.push(' ');
            } else {
                out.push_str("; ");
            }
        }
        out.push_str(part);
    }
    out
}

fn continues(line: &str) -> bool {
    const OPENERS: &[&str] = &["do", "then", "else", "in", "{", "(", "|", "||", "&&", ";", ";;"];
    let last = line.split_whitespace().last().unwrap_or("");
    OPENERS.contains(&last) || line.ends_with(['|', ';']) || line.ends_with("&&")
}

/// Keeps the last `cap` bytes written to it.
struct TailBuffer {
    buf: Vec<u8>,
    cap: usize,
}

impl TailBuffer {
    fn new(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
            cap,
        }
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

impl Write for TailBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() > self.cap {
            let excess = self.buf.len() - self.cap;
            self.buf.drain(..excess);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
