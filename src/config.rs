//! Configuration loading and management.

use crate::tracker::{DEFAULT_COMPLETED_RETENTION_DAYS, DEFAULT_HISTORY_DAYS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project-local configuration directory.
pub const LOCAL_CONFIG_DIR: &str = ".triage-tasks";

/// Configuration file name inside a configuration directory.
pub const CONFIG_FILE: &str = "config.yaml";

pub const ENV_STORAGE_DIR: &str = "TRIAGE_TASKS_STORAGE_DIR";
pub const ENV_RETENTION_DAYS: &str = "TRIAGE_TASKS_RETENTION_DAYS";
pub const ENV_HISTORY_DAYS: &str = "TRIAGE_TASKS_HISTORY_DAYS";

/// Tracker configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

/// Where the task documents live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding outstanding/completed documents and `task_history/`.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(LOCAL_CONFIG_DIR).join("data")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Days to keep completed tasks before `cleanup` drops them.
    #[serde(default = "default_completed_days")]
    pub completed_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            completed_days: default_completed_days(),
        }
    }
}

fn default_completed_days() -> i64 {
    DEFAULT_COMPLETED_RETENTION_DAYS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Window used by `history` when `--days` is not given.
    #[serde(default = "default_days_back")]
    pub default_days_back: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_days_back: default_days_back(),
        }
    }
}

fn default_days_back() -> i64 {
    DEFAULT_HISTORY_DAYS
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration, then apply environment overrides.
    ///
    /// An explicit path must exist and parse. Otherwise the project-local
    /// file, then the one in the home directory, is tried before defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::discover(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn discover() -> Self {
        let candidates = [
            Some(PathBuf::from(LOCAL_CONFIG_DIR).join(CONFIG_FILE)),
            dirs::home_dir().map(|home| home.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE)),
        ];
        for path in candidates.into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config");
                    return config;
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config"),
            }
        }
        Self::default()
    }

    /// Apply overrides from `lookup` (normally the process environment).
    ///
    /// Numeric values that do not parse are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_STORAGE_DIR) {
            self.storage.dir = PathBuf::from(dir);
        }

        if let Some(days) = lookup(ENV_RETENTION_DAYS)
            && let Ok(days) = days.parse()
        {
            self.retention.completed_days = days;
        }

        if let Some(days) = lookup(ENV_HISTORY_DAYS)
            && let Ok(days) = days.parse()
        {
            self.history.default_days_back = days;
        }
    }

    /// Ensure the storage directory exists.
    pub fn ensure_storage_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.storage.dir)
            .with_context(|| format!("creating {}", self.storage.dir.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.dir, PathBuf::from(".triage-tasks/data"));
        assert_eq!(config.retention.completed_days, 30);
        assert_eq!(config.history.default_days_back, 30);
    }

    #[test]
    fn test_load_partial_yaml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "retention:\n  completed_days: 7\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.retention.completed_days, 7);
        assert_eq!(config.history.default_days_back, 30);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load_or_default(Some(&dir.path().join("nope.yaml"))).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_STORAGE_DIR, "/var/lib/triage"),
            (ENV_RETENTION_DAYS, "14"),
            (ENV_HISTORY_DAYS, "not-a-number"),
        ]);
        let mut config = Config::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.storage.dir, PathBuf::from("/var/lib/triage"));
        assert_eq!(config.retention.completed_days, 14);
        assert_eq!(config.history.default_days_back, 30);
    }

    #[test]
    fn test_ensure_storage_dir() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.dir = dir.path().join("a/b");
        config.ensure_storage_dir().unwrap();
        assert!(config.storage.dir.is_dir());
    }
}
