//! History replay against stub and real shells.

mod common;

use std::path::Path;
use std::time::{Duration, Instant};

use runlog_cli::replay::{expand_history, ReplayOptions};
use runlog_core::{RunlogError, ShellKind};

use common::{installed, strings, StubShell, WithHome, EXPANDING_SHELL};

fn options(dir: &Path) -> ReplayOptions {
    ReplayOptions::new(dir.join("runlog.sock"))
        .with_timeout(Duration::from_secs(20))
        .with_poll_interval(Duration::from_millis(20))
}

#[tokio::test]
async fn expands_lines_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let shell = StubShell::new(EXPANDING_SHELL);

    let expanded = expand_history(
        &shell,
        &strings(&["ll", "git status", "", "ll /tmp"]),
        &options(dir.path()),
    )
    .await
    .unwrap();

    assert_eq!(expanded, strings(&["ls -l", "git status", "ls -l /tmp"]));
    assert!(!dir.path().join("runlog.sock").exists());
}

#[tokio::test]
async fn nothing_to_expand_starts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    // Would fail to bind if the collector were started.
    std::fs::write(dir.path().join("runlog.sock"), b"").unwrap();
    let shell = StubShell::new(EXPANDING_SHELL);

    let expanded = expand_history(&shell, &strings(&["", "   "]), &options(dir.path()))
        .await
        .unwrap();
    assert!(expanded.is_empty());
}

#[tokio::test]
async fn silent_shell_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let shell = StubShell::new("exec sleep 30");
    let options = options(dir.path())
        .with_timeout(Duration::from_millis(300))
        .with_poll_interval(Duration::from_millis(50));

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        expand_history(&shell, &strings(&["ls"]), &options),
    )
    .await
    .unwrap()
    .unwrap_err();

    match err {
        RunlogError::ReplayTimedOut {
            expected, received, ..
        } => {
            assert_eq!(expected, 1);
            assert_eq!(received, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dir.path().join("runlog.sock").exists());
}

#[tokio::test]
async fn timeout_holds_even_when_a_background_job_keeps_the_terminal() {
    let dir = tempfile::tempdir().unwrap();
    // The job ignores the hangup and keeps writing to the terminal after
    // the shell itself is killed.
    let shell = StubShell::new("(trap '' HUP; exec sleep 8) & exec sleep 30");
    let options = options(dir.path())
        .with_timeout(Duration::from_millis(300))
        .with_poll_interval(Duration::from_millis(50));

    let started = Instant::now();
    let err = tokio::time::timeout(
        Duration::from_secs(20),
        expand_history(&shell, &strings(&["ls"]), &options),
    )
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, RunlogError::ReplayTimedOut { .. }));
    assert!(started.elapsed() < Duration::from_secs(6));
    assert!(!dir.path().join("runlog.sock").exists());
}

#[tokio::test]
async fn missing_hook_is_recognized_from_shell_output() {
    let dir = tempfile::tempdir().unwrap();
    let shell = StubShell::new(
        "printf '\\033[31m%s\\033[0m\\n' 'Your shell is not configured to use runlog. Please run the following commands:'; exit 1",
    );

    let err = expand_history(&shell, &strings(&["ll"]), &options(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, RunlogError::HookNotInstalled { shell: ShellKind::Bash }));
}

#[tokio::test]
async fn early_exit_reports_status() {
    let dir = tempfile::tempdir().unwrap();
    let shell = StubShell::new("exit 3");

    let err = expand_history(&shell, &strings(&["ll", "ls"]), &options(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RunlogError::ExpanderExited {
            status: 3,
            expected: 2,
            received: 0
        }
    ));
}

#[tokio::test]
async fn real_bash_expands_aliases_without_running_them() {
    let Some(bash) = installed(&["/bin/bash"]) else {
        eprintln!("skipping: bash not found");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("home");
    std::fs::create_dir(&home).unwrap();
    let rc = format!(
        "{}\nalias ll='ls -l'\nalias g=git\n",
        ShellKind::Bash.init_script()
    );
    let shell = WithHome::new(bash, &home, &rc);

    let marker = dir.path().join("ran");
    let touch = format!("touch {}", marker.display());
    let expanded = expand_history(
        &shell,
        &strings(&["ll", "g co main", touch.as_str()]),
        &options(dir.path()),
    )
    .await
    .unwrap();

    assert_eq!(expanded, strings(&["ls -l", "git co main", touch.as_str()]));
    assert!(!marker.exists(), "expansion must not execute commands");
}
