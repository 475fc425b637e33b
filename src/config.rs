//! Configuration management with YAML support and environment overrides.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    /// Tag label → keywords that fire it.
    #[serde(default = "default_tag_map")]
    pub tags: BTreeMap<String, Vec<String>>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Scan loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Root of the watched log directory tree
    #[serde(default = "default_root")]
    pub root: String,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Artifacts processed concurrently within one pass
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Where each artifact format lives under the root, as glob patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_transcripts")]
    pub transcripts: String,

    #[serde(default = "default_history")]
    pub history: String,

    #[serde(default = "default_plans")]
    pub plans: String,

    #[serde(default = "default_todos")]
    pub todos: String,
}

// Default value functions
fn default_database_path() -> String {
    directories::ProjectDirs::from("", "", "logbook")
        .map(|dirs| dirs.data_dir().join("logbook.db").to_string_lossy().into_owned())
        .unwrap_or_else(|| "~/.local/share/logbook/logbook.db".to_string())
}

fn default_root() -> String {
    "~/.claude".to_string()
}

fn default_interval_secs() -> u64 {
    30
}

fn default_workers() -> usize {
    4
}

fn default_transcripts() -> String {
    "projects/**/*.jsonl".to_string()
}

fn default_history() -> String {
    "history.jsonl".to_string()
}

fn default_plans() -> String {
    "plans/*.md".to_string()
}

fn default_todos() -> String {
    "todos/*.json".to_string()
}

fn default_tag_map() -> BTreeMap<String, Vec<String>> {
    let entries: [(&str, &[&str]); 5] = [
        ("debugging", &["error", "bug", "fix", "debug", "issue"]),
        ("refactoring", &["refactor", "cleanup", "restructure"]),
        ("feature", &["implement", "add feature", "new feature"]),
        ("testing", &["test", "spec", "coverage"]),
        ("documentation", &["document", "readme", "comment"]),
    ];
    entries
        .into_iter()
        .map(|(label, keywords)| {
            (
                label.to_string(),
                keywords.iter().map(|k| k.to_string()).collect(),
            )
        })
        .collect()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            interval_secs: default_interval_secs(),
            workers: default_workers(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            transcripts: default_transcripts(),
            history: default_history(),
            plans: default_plans(),
            todos: default_todos(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            scan: ScanConfig::default(),
            layout: LayoutConfig::default(),
            tags: default_tag_map(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./logbook.yaml (current directory)
    /// 3. ~/.config/logbook/logbook.yaml
    ///
    /// Environment variables LOGBOOK_ROOT, LOGBOOK_DB and LOGBOOK_INTERVAL
    /// override the file in all cases.
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "logbook.yaml".to_string(),
            shellexpand::tilde("~/.config/logbook/logbook.yaml").to_string(),
        ];

        let mut config = Config::default();
        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)?;
                config = serde_yaml::from_str(&content)?;
                break;
            }
        }

        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(root) = std::env::var("LOGBOOK_ROOT") {
            self.scan.root = root;
        }
        if let Ok(db) = std::env::var("LOGBOOK_DB") {
            self.database.path = db;
        }
        if let Ok(interval) = std::env::var("LOGBOOK_INTERVAL") {
            self.scan.interval_secs = interval
                .parse()
                .map_err(|_| anyhow::anyhow!("LOGBOOK_INTERVAL must be a number of seconds"))?;
        }
        Ok(())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).to_string())
    }

    /// Get the watched root path, expanding ~ to home directory
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.scan.root).to_string())
    }
}
