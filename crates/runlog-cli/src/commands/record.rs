//! `runlog record`: record an interactive shell session.
//!
//! Runs the user's shell in a subshell with the runlog hook wired in,
//! collects every command typed until the shell exits, and exports them
//! unless the user aborted.

use std::path::PathBuf;

use anyhow::Result;
use runlog_cli::config::Config;
use runlog_cli::display;
use runlog_cli::session::{Session, SessionOptions, SessionOutcome, Terminal};
use runlog_core::{command, shell, CollectorOptions, RcFileSetupChecker, ShellContext};
use tracing::info;

use super::{export, Target};

pub struct RecordArgs {
    pub ignore_errors: bool,
    pub output: Option<PathBuf>,
    pub shell: Option<PathBuf>,
    pub socket: Option<PathBuf>,
}

pub async fn run(cfg: &Config, args: RecordArgs) -> Result<()> {
    let target = Target::resolve(cfg, args.shell, args.socket);
    let hook = shell::for_context(ShellContext::new(&target.shell))?;
    let checker = RcFileSetupChecker::new(&target.shell);
    info!(shell = %target.shell.display(), socket = %target.socket_path.display(), "recording");

    let collector = CollectorOptions::default().ignore_errors(args.ignore_errors);
    let options = SessionOptions::new(&target.socket_path).with_collector(collector);

    let outcome = Session::new(hook.as_ref(), &checker, options)
        .record(Terminal::stdio()?)
        .await?;

    let recorded = match outcome {
        SessionOutcome::Aborted(_) => {
            display::info("Recording aborted, nothing was saved.");
            return Ok(());
        }
        SessionOutcome::Recorded(recorded) => recorded,
    };
    if recorded.is_empty() {
        display::error("No commands were recorded");
        return Ok(());
    }

    export(&command::texts(&recorded), args.output.as_deref())?;
    if let Some(path) = &args.output {
        display::success(&format!("Runbook saved to {}", path.display()));
    }
    Ok(())
}
