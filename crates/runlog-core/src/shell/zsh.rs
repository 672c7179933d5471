use std::path::{Path, PathBuf};

use tracing::debug;

use super::history::{parse_zsh_history, read_history_file, tail};
use super::script::{self, shell_quote, EXPANSION_LOOP};
use super::{home_dir, RcStep, ShellCommand, ShellContext, ShellDescriptor, ShellHook, ShellKind};
use crate::error::RunlogResult;

pub(super) static DESCRIPTOR: ShellDescriptor = ShellDescriptor {
    kind: ShellKind::Zsh,
    name: "zsh",
    login_os_types: &["solaris*", "darwin*", "linux*", "bsd*", "freebsd*", "openbsd*", "netbsd*"],
    login_rc: &[
        RcStep::Source("$ZDOTDIR/.zprofile"),
        RcStep::Source("$ZDOTDIR/.zshrc"),
        RcStep::Source("$ZDOTDIR/.zlogin"),
    ],
    interactive_rc: &[RcStep::Source("$ZDOTDIR/.zshrc")],
    init_rc_file: "~/.zshrc",
    history_file: ".zsh_history",
};

/// Printed by `runlog init zsh`.
pub(super) const INIT_SCRIPT: &str = r#"# runlog shell integration for zsh.
# Add to ~/.zshrc:  eval "$(runlog init zsh)"

runlog_expand_aliases() {
  local line="$1" word seen=" "
  while true; do
    word="${line%%[[:space:]]*}"
    [[ -n "$word" && "$seen" != *" $word "* ]] || break
    (( ${+aliases[$word]} )) || break
    seen+="$word "
    line="${aliases[$word]}${line#"$word"}"
  done
  print -rn -- "$line"
}

runlog_send() {
  [[ -n "${RUNLOG_SOCKET_PATH:-}" ]] || return 0
  "${RUNLOG_BIN:-runlog}" send --socket "$RUNLOG_SOCKET_PATH" -- "$1" >/dev/null 2>&1
}

# preexec passes the alias-expanded command line as $3.
runlog_cmd_pre_exec() {
  [[ -n "${RUNLOG_CONTEXT:-}" ]] || return 0
  runlog_send "$3"
}
"#;

const RECORD_WIRING: &str = r#"
preexec_functions+=(runlog_cmd_pre_exec)
"#;

/// Remembers where the user's own startup files live.
const USER_ZDOTDIR_ENV: &str = "RUNLOG_USER_ZDOTDIR";

/// Zsh has no `--rcfile`; the generated files sit in a temporary `ZDOTDIR`
/// and hand control back to the user's directory while sourcing.
pub struct Zsh {
    ctx: ShellContext,
}

impl Zsh {
    pub fn new(ctx: ShellContext) -> Self {
        Self { ctx }
    }

    fn zshenv(&self, script_dir: &std::path::Path) -> String {
        format!(
            "# Generated by runlog for a single session.\n\
             ZDOTDIR=\"${{{USER_ZDOTDIR_ENV}:-$HOME}}\"\n\
             if [[ -f \"$ZDOTDIR/.zshenv\" ]]; then source \"$ZDOTDIR/.zshenv\"; fi\n\
             ZDOTDIR={}\n",
            shell_quote(&script_dir.to_string_lossy())
        )
    }

    fn zshrc(&self, socket_path: &Path, tail: &str) -> String {
        let mut out = format!("ZDOTDIR=\"${{{USER_ZDOTDIR_ENV}:-$HOME}}\"\n");
        out.push_str(&script::render_startup(&DESCRIPTOR));
        out.push_str(&script::render_hook_guard(ShellKind::Zsh, socket_path));
        out.push_str(tail);
        out
    }

    fn command(&self, socket_path: &Path, tail: &str) -> RunlogResult<ShellCommand> {
        let dir = script::script_dir()?;
        script::write_script(dir.path(), ".zshenv", &self.zshenv(dir.path()))?;
        script::write_script(dir.path(), ".zshrc", &self.zshrc(socket_path, tail))?;

        let user_zdotdir = match std::env::var_os("ZDOTDIR") {
            Some(z) => PathBuf::from(z),
            None => home_dir()?,
        };

        let mut env = self.ctx.base_env();
        env.push(("ZDOTDIR".to_string(), dir.path().to_string_lossy().into_owned()));
        env.push((USER_ZDOTDIR_ENV.to_string(), user_zdotdir.to_string_lossy().into_owned()));
        debug!(shell = %self.ctx.shell_cmd.display(), zdotdir = %dir.path().display(), "zsh prepared");

        Ok(ShellCommand {
            program: self.ctx.shell_cmd.clone(),
            args: vec!["-i".to_string()],
            env,
            script_dir: dir,
        })
    }

    fn history_path(&self) -> RunlogResult<PathBuf> {
        if let Some(path) = &self.ctx.history_file {
            return Ok(path.clone());
        }
        if let Some(path) = std::env::var_os("HISTFILE") {
            return Ok(PathBuf::from(path));
        }
        let base = match std::env::var_os("ZDOTDIR") {
            Some(z) => PathBuf::from(z),
            None => home_dir()?,
        };
        Ok(base.join(DESCRIPTOR.history_file))
    }
}

impl ShellHook for Zsh {
    fn descriptor(&self) -> &'static ShellDescriptor {
        &DESCRIPTOR
    }

    fn spawn(&self, socket_path: &Path) -> RunlogResult<ShellCommand> {
        let mut tail = RECORD_WIRING.to_string();
        tail.push_str(&script::render_abort());
        self.command(socket_path, &tail)
    }

    fn spawn_history_expander(&self, socket_path: &Path) -> RunlogResult<ShellCommand> {
        self.command(socket_path, EXPANSION_LOOP)
    }

    fn tail_history(&self, limit: usize) -> RunlogResult<Vec<String>> {
        let path = self.history_path()?;
        let entries = read_history_file(&path, parse_zsh_history)?;
        Ok(tail(entries, limit))
    }
}
