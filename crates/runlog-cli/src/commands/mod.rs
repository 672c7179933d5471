//! CLI subcommand implementations.

pub mod history;
pub mod init;
pub mod record;
pub mod send;

use std::path::{Path, PathBuf};

use anyhow::Result;
use runlog_cli::collaborators::{
    ConsoleExporter, JsonFileExporter, PassthroughRedactor, Redactor, RunbookExporter,
};
use runlog_cli::config::Config;
use runlog_core::shell;

/// Shell and socket chosen by flag, then config, then environment.
pub struct Target {
    pub shell: PathBuf,
    pub socket_path: PathBuf,
}

impl Target {
    pub fn resolve(cfg: &Config, shell_flag: Option<PathBuf>, socket_flag: Option<PathBuf>) -> Self {
        Self {
            shell: shell_flag
                .or_else(|| cfg.session.shell.clone())
                .unwrap_or_else(shell::user_shell),
            socket_path: socket_flag.unwrap_or_else(|| cfg.session.socket_path.clone()),
        }
    }
}

/// Redact `commands` and hand them to the exporter picked by `output`.
pub fn export(commands: &[String], output: Option<&Path>) -> Result<()> {
    let commands = PassthroughRedactor.commands(commands)?;
    let exporter: Box<dyn RunbookExporter> = match output {
        Some(path) => Box::new(JsonFileExporter::new(path)),
        None => Box::new(ConsoleExporter),
    };
    exporter.export(&commands, &[])
}
