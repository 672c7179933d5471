//! User configuration at `~/.runlog/config.toml`.
//!
//! Provides the collector socket path, a shell override, and history
//! replay limits. CLI flags always override config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

/// Recording session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Collector socket; also the single-session lock.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Shell to record instead of `$SHELL`.
    #[serde(default)]
    pub shell: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            shell: None,
        }
    }
}

/// History replay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// How many of the most recent history entries are offered.
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default = "default_replay_timeout_secs")]
    pub replay_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            replay_timeout_secs: default_replay_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl HistoryConfig {
    pub fn replay_timeout(&self) -> Duration {
        Duration::from_secs(self.replay_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_socket_path() -> PathBuf {
    runlog_core::default_socket_path()
}

fn default_limit() -> usize {
    100
}

fn default_replay_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    250
}

/// `~/.runlog/config.toml`.
pub fn default_config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_default();
    home.join(".runlog").join("config.toml")
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.session.socket_path, runlog_core::default_socket_path());
        assert!(cfg.session.shell.is_none());
        assert_eq!(cfg.history.limit, 100);
        assert_eq!(cfg.history.replay_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.history.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[session]
socket_path = "/run/user/1000/runlog.sock"
shell = "/usr/bin/zsh"

[history]
limit = 20
replay_timeout_secs = 5
poll_interval_ms = 50
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.session.socket_path, PathBuf::from("/run/user/1000/runlog.sock"));
        assert_eq!(cfg.session.shell, Some(PathBuf::from("/usr/bin/zsh")));
        assert_eq!(cfg.history.limit, 20);
        assert_eq!(cfg.history.replay_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.history.poll_interval(), Duration::from_millis(50));
    }

    #[test]
    fn parse_partial_toml_config() {
        let toml_str = r#"
[history]
limit = 10
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.history.limit, 10);
        assert_eq!(cfg.history.replay_timeout_secs, 30); // default
        assert_eq!(cfg.session.socket_path, runlog_core::default_socket_path()); // default
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.history.limit, 100);
    }

    #[test]
    fn malformed_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[history]\nlimit = \"many\"\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config"));
    }
}
