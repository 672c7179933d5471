//! Shared fixtures: `sh` stand-ins for instrumented shells, and real
//! shells confined to a fixture home directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use runlog_core::shell::ShellDescriptor;
use runlog_core::{
    RunlogResult, SetupChecker, ShellCommand, ShellContext, ShellHook, ShellKind,
};

/// Reports every line it reads, exits 77 on `runlog_abort`.
pub const RECORDING_SHELL: &str = r#"
while IFS= read -r line; do
  "$RUNLOG_BIN" send --socket "$RUNLOG_SOCKET_PATH" -- "$line"
  if [ "$line" = runlog_abort ]; then exit 77; fi
done
"#;

/// Expands a single `ll` alias and reports every line it reads.
pub const EXPANDING_SHELL: &str = r#"
while IFS= read -r line; do
  case "$line" in
    ll|ll\ *) line="ls -l${line#ll}" ;;
  esac
  "$RUNLOG_BIN" send --socket "$RUNLOG_SOCKET_PATH" -- "$line"
done
exit 0
"#;

/// A [`ShellHook`] that runs `script` under `/bin/sh`.
pub struct StubShell {
    script: String,
}

impl StubShell {
    pub fn new(script: &str) -> Self {
        Self {
            script: script.to_string(),
        }
    }

    fn command(&self, socket_path: &Path) -> RunlogResult<ShellCommand> {
        Ok(ShellCommand::new(
            "/bin/sh",
            vec!["-c".to_string(), self.script.clone()],
            vec![
                ("RUNLOG_BIN".to_string(), env!("CARGO_BIN_EXE_runlog").to_string()),
                ("RUNLOG_SOCKET_PATH".to_string(), socket_path.display().to_string()),
            ],
            tempfile::tempdir()?,
        ))
    }
}

impl ShellHook for StubShell {
    fn descriptor(&self) -> &'static ShellDescriptor {
        ShellKind::Bash.descriptor()
    }

    fn spawn(&self, socket_path: &Path) -> RunlogResult<ShellCommand> {
        self.command(socket_path)
    }

    fn spawn_history_expander(&self, socket_path: &Path) -> RunlogResult<ShellCommand> {
        self.command(socket_path)
    }

    fn tail_history(&self, _limit: usize) -> RunlogResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Setup check that always passes.
pub struct Ready;

impl SetupChecker for Ready {
    fn check_setup(&self) -> RunlogResult<()> {
        Ok(())
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The first of `candidates` that exists.
pub fn installed(candidates: &[&'static str]) -> Option<&'static str> {
    candidates.iter().copied().find(|path| Path::new(path).exists())
}

/// A real shell hook whose startup files and history live under `home`.
pub struct WithHome {
    inner: Box<dyn ShellHook>,
    home: PathBuf,
}

impl WithHome {
    /// Write `rc` (the hook definition plus anything extra) to the startup
    /// files `shell` reads, inside `home`.
    pub fn new(shell: &str, home: &Path, rc: &str) -> Self {
        let inner = runlog_core::shell::for_context(
            ShellContext::new(shell).with_sender_bin(env!("CARGO_BIN_EXE_runlog")),
        )
        .unwrap();
        let files: &[&str] = match inner.kind() {
            // Login and non-login startup both end up here.
            ShellKind::Bash => &[".bash_profile", ".bashrc"],
            ShellKind::Zsh => &[".zshrc"],
        };
        for file in files {
            std::fs::write(home.join(file), rc).unwrap();
        }
        Self {
            inner,
            home: home.to_path_buf(),
        }
    }

    fn confine(&self, mut command: ShellCommand) -> ShellCommand {
        let home = self.home.display().to_string();
        command.env.push(("HOME".to_string(), home.clone()));
        command.env.push(("RUNLOG_USER_ZDOTDIR".to_string(), home));
        command.env.push((
            "HISTFILE".to_string(),
            self.home.join(".history").display().to_string(),
        ));
        command
    }
}

impl ShellHook for WithHome {
    fn descriptor(&self) -> &'static ShellDescriptor {
        self.inner.descriptor()
    }

    fn spawn(&self, socket_path: &Path) -> RunlogResult<ShellCommand> {
        Ok(self.confine(self.inner.spawn(socket_path)?))
    }

    fn spawn_history_expander(&self, socket_path: &Path) -> RunlogResult<ShellCommand> {
        Ok(self.confine(self.inner.spawn_history_expander(socket_path)?))
    }

    fn tail_history(&self, limit: usize) -> RunlogResult<Vec<String>> {
        self.inner.tail_history(limit)
    }
}
