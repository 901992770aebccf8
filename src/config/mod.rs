//! Capacity settings for the bus, selection trace and undo history.
//!
//! Read from a JSON file; every field is optional and falls back to the
//! defaults in [`consts`](crate::consts).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::consts::{DEFAULT_BUS_HISTORY_SIZE, DEFAULT_SELECTION_TRACE_SIZE, DEFAULT_UNDO_LIMIT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub max_history_size: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_history_size: DEFAULT_BUS_HISTORY_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub max_history_size: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_history_size: DEFAULT_SELECTION_TRACE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_history_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history_size: DEFAULT_UNDO_LIMIT,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bus: BusConfig,
    pub selection: SelectionConfig,
    pub history: HistoryConfig,
}

impl Config {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse config JSON")
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_consts() {
        let config = Config::default();
        assert_eq!(config.bus.max_history_size, 100);
        assert_eq!(config.selection.max_history_size, 20);
        assert_eq!(config.history.max_history_size, 50);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config = Config::from_json(r#"{"history": {"max_history_size": 5}}"#).unwrap();
        assert_eq!(config.history.max_history_size, 5);
        assert_eq!(config.bus.max_history_size, 100);
        assert_eq!(config.selection.max_history_size, 20);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Config::from_json("{not json").is_err());
    }

    #[test]
    fn persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.bus.max_history_size = 7;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.bus.max_history_size, 7);
        assert_eq!(loaded, config);
    }
}
