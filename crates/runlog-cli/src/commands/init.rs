//! `runlog init <shell>`: print the permanent shell hook.

use std::path::Path;

use anyhow::Result;
use runlog_core::ShellKind;

/// Print the hook definition for `shell` ("bash" or "zsh").
pub fn run(shell: &str) -> Result<()> {
    let kind = ShellKind::from_path(Path::new(shell))?;
    print!("{}", kind.init_script());
    Ok(())
}
