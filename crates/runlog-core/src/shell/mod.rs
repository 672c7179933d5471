//! Shell hook provisioning.
//!
//! Each supported shell family gets a [`ShellHook`] implementation that
//! materializes a throwaway startup script. The script sources the user's
//! normal startup files, checks that the permanent hook from
//! `runlog init <shell>` is defined, and then either wires the hook for
//! interactive recording or runs a side-effect-free alias expansion loop.

mod bash;
pub mod history;
mod script;
mod zsh;

use std::fmt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{RunlogError, RunlogResult};

pub use bash::Bash;
pub use zsh::Zsh;

/// Environment marker set for every instrumented shell.
pub const CONTEXT_ENV: &str = "RUNLOG_CONTEXT";

/// Environment variable through which the hook finds the `runlog` binary.
pub const SENDER_BIN_ENV: &str = "RUNLOG_BIN";

/// Name of the pre-execution hook function defined by `runlog init`.
pub const HOOK_FUNCTION: &str = "runlog_cmd_pre_exec";

/// First line the generated startup script prints when the hook is missing.
pub const NOT_CONFIGURED_MESSAGE: &str =
    "Your shell is not configured to use runlog. Please run the following commands:";

/// Supported shell families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellKind {
    Bash,
    Zsh,
}

impl ShellKind {
    /// Resolve a family from a shell path such as `/usr/bin/zsh` or `-bash`.
    pub fn from_path(path: &Path) -> RunlogResult<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().trim_start_matches('-').to_string())
            .unwrap_or_default();
        match name.as_str() {
            "bash" => Ok(ShellKind::Bash),
            "zsh" => Ok(ShellKind::Zsh),
            _ => Err(RunlogError::UnsupportedShell(path.display().to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }

    pub fn descriptor(&self) -> &'static ShellDescriptor {
        match self {
            ShellKind::Bash => &bash::DESCRIPTOR,
            ShellKind::Zsh => &zsh::DESCRIPTOR,
        }
    }

    /// The permanent hook definition printed by `runlog init`.
    pub fn init_script(&self) -> &'static str {
        match self {
            ShellKind::Bash => bash::INIT_SCRIPT,
            ShellKind::Zsh => zsh::INIT_SCRIPT,
        }
    }

    /// Exact steps that install the permanent hook.
    pub fn remediation(&self) -> String {
        self.remediation_lines().join("\n")
    }

    pub(crate) fn remediation_lines(&self) -> Vec<String> {
        let rc = self.descriptor().init_rc_file;
        vec![
            NOT_CONFIGURED_MESSAGE.to_string(),
            String::new(),
            format!("> echo 'eval \"$(runlog init {})\"' >> {rc}", self.name()),
            format!("> source {rc}"),
        ]
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of a startup-file search order.
#[derive(Debug, Clone, Copy)]
pub enum RcStep {
    /// Source the file when it exists.
    Source(&'static str),
    /// Source only the first existing file of the list.
    FirstOf(&'static [&'static str]),
}

impl RcStep {
    pub fn paths(&self) -> Vec<&'static str> {
        match self {
            RcStep::Source(p) => vec![p],
            RcStep::FirstOf(ps) => ps.to_vec(),
        }
    }
}

/// Immutable per-family configuration.
#[derive(Debug)]
pub struct ShellDescriptor {
    pub kind: ShellKind,
    pub name: &'static str,
    /// `$OSTYPE` patterns on which the startup script loads the login file set.
    pub login_os_types: &'static [&'static str],
    pub login_rc: &'static [RcStep],
    pub interactive_rc: &'static [RcStep],
    /// File the remediation tells the user to extend.
    pub init_rc_file: &'static str,
    /// History file relative to the home (or `ZDOTDIR`) directory.
    pub history_file: &'static str,
}

/// Everything a startup script needs to know about the current session.
#[derive(Debug, Clone)]
pub struct ShellContext {
    pub shell_cmd: PathBuf,
    /// Binary the hook runs as `<bin> send --socket ...`.
    pub sender_bin: PathBuf,
    /// Overrides the family's default history file location.
    pub history_file: Option<PathBuf>,
}

impl ShellContext {
    pub fn new(shell_cmd: impl Into<PathBuf>) -> Self {
        let sender_bin = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("runlog"));
        Self {
            shell_cmd: shell_cmd.into(),
            sender_bin,
            history_file: None,
        }
    }

    pub fn with_sender_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.sender_bin = bin.into();
        self
    }

    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_file = Some(path.into());
        self
    }

    fn base_env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            (CONTEXT_ENV.to_string(), "1".to_string()),
            (
                SENDER_BIN_ENV.to_string(),
                self.sender_bin.to_string_lossy().into_owned(),
            ),
        ];
        if std::env::var_os("TERM").is_none() {
            env.push(("TERM".to_string(), "xterm-256color".to_string()));
        }
        env
    }
}

/// A ready-to-launch shell invocation.
///
/// Owns the generated startup files; they are deleted when this value (or
/// the process wrapper it is moved into) is dropped.
#[derive(Debug)]
pub struct ShellCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    script_dir: TempDir,
}

impl ShellCommand {
    /// Wrap an arbitrary program. `script_dir` is deleted on drop.
    pub fn new(
        program: impl Into<PathBuf>,
        args: Vec<String>,
        env: Vec<(String, String)>,
        script_dir: TempDir,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            env,
            script_dir,
        }
    }

    pub fn script_dir(&self) -> &Path {
        self.script_dir.path()
    }
}

/// Behavior shared by every supported shell family.
pub trait ShellHook: Send + Sync {
    fn descriptor(&self) -> &'static ShellDescriptor;

    /// Prepare an interactive shell that reports every command it runs to
    /// the collector at `socket_path`.
    fn spawn(&self, socket_path: &Path) -> RunlogResult<ShellCommand>;

    /// Prepare a shell that reads lines from its terminal, reports each
    /// line with aliases expanded, and never executes them. It exits on
    /// end-of-file.
    fn spawn_history_expander(&self, socket_path: &Path) -> RunlogResult<ShellCommand>;

    /// The last `limit` history entries, oldest first, unexpanded.
    fn tail_history(&self, limit: usize) -> RunlogResult<Vec<String>>;

    fn kind(&self) -> ShellKind {
        self.descriptor().kind
    }
}

/// Pick the hook implementation for the shell at `ctx.shell_cmd`.
pub fn for_context(ctx: ShellContext) -> RunlogResult<Box<dyn ShellHook>> {
    match ShellKind::from_path(&ctx.shell_cmd)? {
        ShellKind::Bash => Ok(Box::new(Bash::new(ctx))),
        ShellKind::Zsh => Ok(Box::new(Zsh::new(ctx))),
    }
}

/// The user's configured shell: `$SHELL`, falling back to `/bin/sh`.
pub fn user_shell() -> PathBuf {
    std::env::var_os("SHELL")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/bin/sh"))
}

fn home_dir() -> RunlogResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| RunlogError::Config("could not determine home directory".into()))
}
