//! Building blocks shared by the generated bash and zsh startup scripts.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use super::{RcStep, ShellDescriptor, ShellKind, HOOK_FUNCTION};
use crate::error::RunlogResult;
use crate::wire::{ABORT_COMMAND, ABORT_EXIT_CODE};

/// Reads lines until end-of-file and reports each with aliases expanded.
/// Nothing read here is ever executed.
pub(super) const EXPANSION_LOOP: &str = r#"
while IFS= read -r runlog_line; do
  [[ -z "${runlog_line//[[:space:]]/}" ]] && continue
  runlog_send "$(runlog_expand_aliases "$runlog_line")"
done
builtin exit 0
"#;

/// Quote `value` for POSIX-style shells.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub(super) fn script_dir() -> RunlogResult<TempDir> {
    Ok(tempfile::Builder::new().prefix("runlog-").tempdir()?)
}

pub(super) fn write_script(dir: &Path, name: &str, content: &str) -> RunlogResult<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, content)?;
    debug!(path = %path.display(), "startup script written");
    Ok(path)
}

/// Login-shell detection followed by the family's startup-file search order.
pub(super) fn render_startup(desc: &ShellDescriptor) -> String {
    let mut out = String::from("# Generated by runlog for a single session.\n\n");
    out.push_str("RUNLOG_LOGIN_SHELL=0\ncase \"$OSTYPE\" in\n");
    let _ = writeln!(out, "  {}) RUNLOG_LOGIN_SHELL=1 ;;", desc.login_os_types.join("|"));
    out.push_str("  msys*|cygwin*) echo \"windows is not supported\" ;;\n");
    out.push_str("  *) echo \"unknown: $OSTYPE\" ;;\n");
    out.push_str("esac\n\n");

    out.push_str("if [[ \"$RUNLOG_LOGIN_SHELL\" == \"1\" ]]; then\n");
    render_steps(&mut out, desc.login_rc);
    out.push_str("else\n");
    render_steps(&mut out, desc.interactive_rc);
    out.push_str("fi\n");
    out
}

fn render_steps(out: &mut String, steps: &[RcStep]) {
    if steps.is_empty() {
        out.push_str("  :\n");
    }
    for step in steps {
        match step {
            RcStep::Source(path) => {
                let _ = writeln!(out, "  if [[ -f \"{path}\" ]]; then source \"{path}\"; fi");
            }
            RcStep::FirstOf(paths) => {
                for (i, path) in paths.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elif" };
                    let _ = writeln!(out, "  {keyword} [[ -f \"{path}\" ]]; then source \"{path}\"");
                }
                out.push_str("  fi\n");
            }
        }
    }
}

/// Socket path export plus the guard that refuses to run without the
/// permanent hook.
pub(super) fn render_hook_guard(kind: ShellKind, socket_path: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\nRUNLOG_SOCKET_PATH={}\nexport RUNLOG_SOCKET_PATH\n",
        shell_quote(&socket_path.to_string_lossy())
    );
    let _ = writeln!(out, "if ! type {HOOK_FUNCTION} >/dev/null 2>&1; then");
    for line in kind.remediation_lines() {
        if line.is_empty() {
            out.push_str("  echo\n");
        } else {
            let _ = writeln!(out, "  printf '\\033[31m%s\\033[0m\\n' {}", shell_quote(&line));
        }
    }
    out.push_str("  builtin exit 1\nfi\n");
    out
}

/// The function a recording user runs to discard the session.
pub(super) fn render_abort() -> String {
    format!(
        "\n{ABORT_COMMAND}() {{ builtin exit {ABORT_EXIT_CODE}; }}\n\
         echo\n\
         echo \"Type 'exit' or press 'ctrl+d' to stop recording, or '{ABORT_COMMAND}' to discard it.\"\n"
    )
}
