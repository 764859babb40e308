//! Configuration management with YAML support

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::parser::Vendor;
use crate::pending::ACTIVE_WINDOW_DAYS;
use crate::watcher::{WatchOptions, WatchRoot};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Keyed by source name: `claude`, `cursor`
    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,

    #[serde(default)]
    pub watcher: WatcherConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Transcript source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Vendor data directory; transcripts live under `<base_path>/projects`
    #[serde(default)]
    pub base_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_workers")]
    pub workers_per_root: usize,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    #[serde(default = "default_pending_max_age")]
    pub pending_max_age_days: i64,
}

// Default value functions
fn default_database_path() -> String {
    "~/.claude-activity/activity.db".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_workers() -> usize {
    4
}

fn default_shutdown_timeout() -> u64 {
    5
}

fn default_pending_max_age() -> i64 {
    ACTIVE_WINDOW_DAYS
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            workers_per_root: default_workers(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            pending_max_age_days: default_pending_max_age(),
        }
    }
}

fn source_key(vendor: Vendor) -> &'static str {
    match vendor {
        Vendor::ClaudeCode => "claude",
        Vendor::Cursor => "cursor",
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./activity-log.yaml (current directory)
    /// 3. ~/.config/activity-log/activity-log.yaml
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut search_paths = Vec::new();
        if let Some(path) = path {
            search_paths.push(expand(path));
        }
        search_paths.push(PathBuf::from("activity-log.yaml"));
        search_paths.push(expand("~/.config/activity-log/activity-log.yaml"));

        for search_path in &search_paths {
            if search_path.exists() {
                return Self::from_file(search_path);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("parse config {}", path.display()))
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        expand(&self.database.path)
    }

    /// Sources are enabled unless explicitly disabled
    pub fn is_source_enabled(&self, vendor: Vendor) -> bool {
        self.sources
            .get(source_key(vendor))
            .map_or(true, |s| s.enabled)
    }

    /// Vendor data directory, `~/.claude` or `~/.cursor` unless configured
    pub fn source_base(&self, vendor: Vendor) -> PathBuf {
        if let Some(base) = self
            .sources
            .get(source_key(vendor))
            .and_then(|s| s.base_path.as_deref())
        {
            return expand(base);
        }
        let home = dirs::home_dir().unwrap_or_default();
        match vendor {
            Vendor::ClaudeCode => home.join(".claude"),
            Vendor::Cursor => home.join(".cursor"),
        }
    }

    /// One watch root per enabled source
    pub fn watch_roots(&self) -> Vec<WatchRoot> {
        [Vendor::ClaudeCode, Vendor::Cursor]
            .into_iter()
            .filter(|v| self.is_source_enabled(*v))
            .map(|v| WatchRoot::new(v, self.source_base(v).join("projects")))
            .collect()
    }

    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            workers_per_root: self.watcher.workers_per_root.max(1),
            shutdown_timeout: Duration::from_secs(self.watcher.shutdown_timeout_secs),
        }
    }
}
