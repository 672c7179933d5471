//! Pre-flight check that the user has installed the permanent shell hook.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{RunlogError, RunlogResult};
use crate::shell::{ShellKind, HOOK_FUNCTION};

/// Verifies that recording can start at all.
pub trait SetupChecker: Send + Sync {
    fn check_setup(&self) -> RunlogResult<()>;
}

/// Looks for `runlog init <shell>` (or the hook function itself) in the
/// startup files the generated script will source.
pub struct RcFileSetupChecker {
    shell: PathBuf,
    home: Option<PathBuf>,
    zdotdir: Option<PathBuf>,
}

impl RcFileSetupChecker {
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            home: dirs::home_dir(),
            zdotdir: std::env::var_os("ZDOTDIR").map(PathBuf::from),
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    fn rc_files(&self, kind: ShellKind, home: &Path) -> Vec<PathBuf> {
        let desc = kind.descriptor();
        let zdotdir = self.zdotdir.clone().unwrap_or_else(|| home.to_path_buf());

        let mut files = Vec::new();
        for step in desc.login_rc.iter().chain(desc.interactive_rc) {
            for raw in step.paths() {
                let path = if let Some(rest) = raw.strip_prefix("$HOME/") {
                    home.join(rest)
                } else if let Some(rest) = raw.strip_prefix("$ZDOTDIR/") {
                    zdotdir.join(rest)
                } else {
                    // System-wide files are not the user's to edit.
                    continue;
                };
                if !files.contains(&path) {
                    files.push(path);
                }
            }
        }
        files
    }
}

impl SetupChecker for RcFileSetupChecker {
    fn check_setup(&self) -> RunlogResult<()> {
        let kind = ShellKind::from_path(&self.shell)?;
        let home = self
            .home
            .clone()
            .ok_or_else(|| RunlogError::Config("could not determine home directory".into()))?;

        let init_line = format!("runlog init {}", kind.name());
        for file in self.rc_files(kind, &home) {
            let Ok(content) = std::fs::read_to_string(&file) else {
                continue;
            };
            if content.contains(&init_line) || content.contains(HOOK_FUNCTION) {
                debug!(file = %file.display(), "runlog hook found");
                return Ok(());
            }
        }
        Err(RunlogError::HookNotInstalled { shell: kind })
    }
}
