//! Interfaces to the pieces that sit around the capture core, plus the
//! local implementations `runlog` ships with.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::MultiSelect;
use serde::Serialize;
use tracing::info;

/// Scrubs secrets from recorded commands before they leave the machine.
pub trait Redactor {
    fn commands(&self, commands: &[String]) -> Result<Vec<String>>;
}

/// Leaves commands untouched.
pub struct PassthroughRedactor;

impl Redactor for PassthroughRedactor {
    fn commands(&self, commands: &[String]) -> Result<Vec<String>> {
        Ok(commands.to_vec())
    }
}

/// Turns an ordered command list into a runbook.
pub trait RunbookExporter {
    fn export(&self, commands: &[String], links: &[String]) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct Runbook<'a> {
    commands: &'a [String],
    links: &'a [String],
}

/// Numbered listing on stdout.
pub struct ConsoleExporter;

impl RunbookExporter for ConsoleExporter {
    fn export(&self, commands: &[String], links: &[String]) -> Result<()> {
        let mut out = std::io::stdout().lock();
        render_listing(&mut out, commands, links)?;
        Ok(())
    }
}

fn render_listing(out: &mut dyn Write, commands: &[String], links: &[String]) -> std::io::Result<()> {
    writeln!(out, "Recorded {} command(s):", commands.len())?;
    for (i, command) in commands.iter().enumerate() {
        writeln!(out, "  {:>3}  {command}", i + 1)?;
    }
    for link in links {
        writeln!(out, "  {link}")?;
    }
    Ok(())
}

/// Pretty-printed JSON written to a file.
pub struct JsonFileExporter {
    path: PathBuf,
}

impl JsonFileExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RunbookExporter for JsonFileExporter {
    fn export(&self, commands: &[String], links: &[String]) -> Result<()> {
        let content = serde_json::to_string_pretty(&Runbook { commands, links })
            .context("failed to serialize runbook")?;
        std::fs::write(&self.path, content + "\n")
            .with_context(|| format!("failed to write runbook to {}", self.path.display()))?;
        info!(path = %self.path.display(), count = commands.len(), "runbook written");
        Ok(())
    }
}

/// Lets the user pick which history lines go into the runbook.
pub trait CommandSelector {
    fn select(&self, history: &[String]) -> Result<Vec<String>>;
}

/// Takes every line.
pub struct SelectAll;

impl CommandSelector for SelectAll {
    fn select(&self, history: &[String]) -> Result<Vec<String>> {
        Ok(history.to_vec())
    }
}

/// Interactive multi-select prompt.
pub struct PromptSelector;

impl CommandSelector for PromptSelector {
    fn select(&self, history: &[String]) -> Result<Vec<String>> {
        let items: Vec<String> = history
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:>3} {line}", i + 1))
            .collect();
        let picked = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt("Select commands for your runbook (space to toggle, enter to confirm)")
            .items(&items)
            .interact()
            .context("command selection failed")?;
        Ok(picked.into_iter().map(|i| history[i].clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn passthrough_keeps_order() {
        let commands = strings(&["ls -la", "git status"]);
        assert_eq!(PassthroughRedactor.commands(&commands).unwrap(), commands);
    }

    #[test]
    fn select_all_takes_everything() {
        let history = strings(&["a", "b", "c"]);
        assert_eq!(SelectAll.select(&history).unwrap(), history);
    }

    #[test]
    fn listing_is_numbered() {
        let mut out = Vec::new();
        render_listing(&mut out, &strings(&["ls -la", "echo hi"]), &[]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Recorded 2 command(s):\n    1  ls -la\n    2  echo hi\n");
    }

    #[test]
    fn json_export_round_trips_through_serde() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runbook.json");
        JsonFileExporter::new(&path)
            .export(&strings(&["ls -l", "git checkout main"]), &strings(&["https://example.com"]))
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["commands"][1], "git checkout main");
        assert_eq!(value["links"][0], "https://example.com");
    }

    #[test]
    fn json_export_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonFileExporter::new(dir.path().join("missing/runbook.json"))
            .export(&strings(&["ls"]), &[])
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to write runbook"));
    }
}
