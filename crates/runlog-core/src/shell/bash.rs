use std::path::{Path, PathBuf};

use tracing::debug;

use super::history::{parse_bash_history, read_history_file, tail};
use super::script::{self, EXPANSION_LOOP};
use super::{home_dir, RcStep, ShellCommand, ShellContext, ShellDescriptor, ShellHook, ShellKind};
use crate::error::RunlogResult;

pub(super) static DESCRIPTOR: ShellDescriptor = ShellDescriptor {
    kind: ShellKind::Bash,
    name: "bash",
    login_os_types: &["solaris*", "darwin*", "linux*", "bsd*", "freebsd*", "openbsd*", "netbsd*"],
    // Reference for loading behavior:
    // https://shreevatsa.wordpress.com/2008/03/30/zshbash-startup-files-loading-order-bashrc-zshrc-etc/
    login_rc: &[
        RcStep::Source("/etc/profile"),
        RcStep::FirstOf(&["$HOME/.bash_profile", "$HOME/.bash_login", "$HOME/.profile"]),
    ],
    interactive_rc: &[
        RcStep::Source("/etc/bash.bashrc"),
        RcStep::Source("$HOME/.bashrc"),
    ],
    init_rc_file: "~/.bashrc",
    history_file: ".bash_history",
};

/// Printed by `runlog init bash`.
pub(super) const INIT_SCRIPT: &str = r#"# runlog shell integration for bash.
# Add to ~/.bashrc:  eval "$(runlog init bash)"

runlog_expand_aliases() {
  local line="$1" word seen=" "
  while :; do
    word="${line%%[[:space:]]*}"
    [[ -n "$word" && "$seen" != *" $word "* ]] || break
    [[ -n "${BASH_ALIASES[$word]+set}" ]] || break
    seen+="$word "
    line="${BASH_ALIASES[$word]}${line:${#word}}"
  done
  printf '%s' "$line"
}

runlog_send() {
  [[ -n "${RUNLOG_SOCKET_PATH:-}" ]] || return 0
  "${RUNLOG_BIN:-runlog}" send --socket "$RUNLOG_SOCKET_PATH" -- "$1" >/dev/null 2>&1
}

runlog_history_entry() {
  HISTTIMEFORMAT= builtin history 1
}

# First in PROMPT_COMMAND: marks the trap firing for the prompt itself.
runlog_prompt_start() {
  runlog_armed=0
}

# Last in PROMPT_COMMAND: the next DEBUG trap belongs to a typed command.
runlog_arm() {
  runlog_armed=1
}

runlog_cmd_pre_exec() {
  [[ -n "${RUNLOG_CONTEXT:-}" && "${runlog_armed:-0}" == 1 ]] || return 0
  runlog_armed=0
  # An empty command line goes straight back to the prompt.
  [[ "$BASH_COMMAND" != runlog_prompt_start ]] || return 0
  [[ -n "${COMP_LINE:-}" ]] && return 0
  local entry
  entry="$(runlog_history_entry)"
  [[ "$entry" =~ ^[[:space:]]*[0-9]+[*]?[[:space:]]+(.*)$ ]] || return 0
  runlog_send "$(runlog_expand_aliases "${BASH_REMATCH[1]}")"
}
"#;

const RECORD_WIRING: &str = r#"
# Every typed command must reach `history 1`, including repeats and
# commands with a leading space.
HISTCONTROL="${HISTCONTROL//ignoreboth/ignoredups}"
HISTCONTROL="${HISTCONTROL//ignorespace/}"
HISTCONTROL="${HISTCONTROL//erasedups/}"

trap 'runlog_cmd_pre_exec' DEBUG
PROMPT_COMMAND="runlog_prompt_start
${PROMPT_COMMAND:+$PROMPT_COMMAND
}runlog_arm"
"#;

const RC_FILE: &str = "runlog.bashrc";

/// Bash: the generated script is passed through `--rcfile`.
pub struct Bash {
    ctx: ShellContext,
}

impl Bash {
    pub fn new(ctx: ShellContext) -> Self {
        Self { ctx }
    }

    fn startup(&self, socket_path: &Path) -> String {
        let mut out = script::render_startup(&DESCRIPTOR);
        out.push_str(&script::render_hook_guard(ShellKind::Bash, socket_path));
        out
    }

    fn command(&self, content: String) -> RunlogResult<ShellCommand> {
        let dir = script::script_dir()?;
        let rc = script::write_script(dir.path(), RC_FILE, &content)?;
        debug!(shell = %self.ctx.shell_cmd.display(), rc = %rc.display(), "bash prepared");
        Ok(ShellCommand {
            program: self.ctx.shell_cmd.clone(),
            args: vec!["--rcfile".to_string(), rc.to_string_lossy().into_owned(), "-i".to_string()],
            env: self.ctx.base_env(),
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
        Ok(home_dir()?.join(DESCRIPTOR.history_file))
    }
}

impl ShellHook for Bash {
    fn descriptor(&self) -> &'static ShellDescriptor {
        &DESCRIPTOR
    }

    fn spawn(&self, socket_path: &Path) -> RunlogResult<ShellCommand> {
        let mut content = self.startup(socket_path);
        content.push_str(RECORD_WIRING);
        content.push_str(&script::render_abort());
        self.command(content)
    }

    fn spawn_history_expander(&self, socket_path: &Path) -> RunlogResult<ShellCommand> {
        let mut content = self.startup(socket_path);
        content.push_str(EXPANSION_LOOP);
        self.command(content)
    }

    fn tail_history(&self, limit: usize) -> RunlogResult<Vec<String>> {
        let path = self.history_path()?;
        let entries = read_history_file(&path, parse_bash_history)?;
        Ok(tail(entries, limit))
    }
}
