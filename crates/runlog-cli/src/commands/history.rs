//! `runlog history`: build a runbook from recent shell history.
//!
//! Offers the last N history entries, expands aliases in the chosen ones
//! without running them, and exports the result.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use runlog_cli::collaborators::{CommandSelector, PromptSelector, SelectAll};
use runlog_cli::config::Config;
use runlog_cli::display;
use runlog_cli::replay::{expand_history, ReplayOptions};
use runlog_core::{shell, RcFileSetupChecker, SetupChecker, ShellContext};
use tracing::info;

use super::{export, Target};

pub struct HistoryArgs {
    pub limit: Option<usize>,
    pub all: bool,
    pub output: Option<PathBuf>,
    pub shell: Option<PathBuf>,
    pub socket: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

pub async fn run(cfg: &Config, args: HistoryArgs) -> Result<()> {
    let target = Target::resolve(cfg, args.shell, args.socket);
    let hook = shell::for_context(ShellContext::new(&target.shell))?;
    RcFileSetupChecker::new(&target.shell).check_setup()?;

    let limit = args.limit.unwrap_or(cfg.history.limit);
    let lines = hook.tail_history(limit)?;
    if lines.is_empty() {
        display::error("No shell history found");
        return Ok(());
    }

    let selector: Box<dyn CommandSelector> = if args.all {
        Box::new(SelectAll)
    } else {
        Box::new(PromptSelector)
    };
    let selected = selector.select(&lines)?;
    if selected.is_empty() {
        display::info("Nothing selected");
        return Ok(());
    }
    info!(selected = selected.len(), "expanding history");

    let timeout = args
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| cfg.history.replay_timeout());
    let options = ReplayOptions::new(&target.socket_path)
        .with_timeout(timeout)
        .with_poll_interval(cfg.history.poll_interval());

    let commands = expand_history(hook.as_ref(), &selected, &options).await?;
    if commands.is_empty() {
        display::error("No commands were recorded");
        return Ok(());
    }

    export(&commands, args.output.as_deref())?;
    if let Some(path) = &args.output {
        display::success(&format!("Runbook saved to {}", path.display()));
    }
    Ok(())
}
