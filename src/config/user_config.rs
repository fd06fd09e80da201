//! User-level configuration for heapscope
//!
//! Supports loading config from:
//! - Environment variables
//! - ~/.config/heapscope/config.toml
//!
//! ```toml
//! [load]
//! show_progress = true
//!
//! [analysis]
//! namespace_types = ["module"]
//! table_types = ["dict"]
//! prune_on_load = false
//! workers = 8
//! ```

use crate::graph::NamespaceRule;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Accepted worker thread counts
const WORKERS_RANGE: std::ops::RangeInclusive<usize> = 1..=64;

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserConfig {
    #[serde(default)]
    pub load: LoadConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoadConfig {
    /// Draw a progress indicator while loading (default: true)
    pub show_progress: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Types that own a namespace (default: ["module"])
    pub namespace_types: Option<Vec<String>>,

    /// Types that act as a namespace's attribute table (default: ["dict"])
    pub table_types: Option<Vec<String>>,

    /// Cut expensive references before computing sizes (default: false)
    pub prune_on_load: Option<bool>,

    /// Worker threads for the compute passes (default: rayon's choice)
    pub workers: Option<usize>,
}

impl UserConfig {
    /// Load config from all sources, with priority:
    /// 1. Environment variables (highest)
    /// 2. User config (~/.config/heapscope/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = UserConfig::default();

        if let Some(path) = Self::user_config_path().filter(|p| p.exists()) {
            match std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))
                .and_then(|content| Self::from_toml_str(&content))
            {
                Ok(user_config) => config.merge(user_config),
                Err(e) => warn!("Ignoring user config: {:#}", e),
            }
        } else {
            debug!("No user config file, using defaults");
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid heapscope config")
    }

    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("heapscope").join("config.toml"))
    }

    /// Merge another config into this one (other takes priority)
    fn merge(&mut self, other: UserConfig) {
        if other.load.show_progress.is_some() {
            self.load.show_progress = other.load.show_progress;
        }
        if other.analysis.namespace_types.is_some() {
            self.analysis.namespace_types = other.analysis.namespace_types;
        }
        if other.analysis.table_types.is_some() {
            self.analysis.table_types = other.analysis.table_types;
        }
        if other.analysis.prune_on_load.is_some() {
            self.analysis.prune_on_load = other.analysis.prune_on_load;
        }
        match other.analysis.workers {
            Some(n) if WORKERS_RANGE.contains(&n) => self.analysis.workers = Some(n),
            Some(n) => warn!("Ignoring workers = {} in config: must be 1-64", n),
            None => {}
        }
    }

    /// `HEAPSCOPE_NO_PROGRESS` and `HEAPSCOPE_WORKERS` override the file
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(value) = var("HEAPSCOPE_NO_PROGRESS") {
            let off = !matches!(value.trim(), "" | "0" | "false");
            self.load.show_progress = Some(!off);
        }
        if let Some(value) = var("HEAPSCOPE_WORKERS") {
            match value.trim().parse::<usize>() {
                Ok(n) if WORKERS_RANGE.contains(&n) => self.analysis.workers = Some(n),
                _ => warn!("Ignoring HEAPSCOPE_WORKERS={:?}: must be 1-64", value),
            }
        }
    }

    pub fn show_progress(&self) -> bool {
        self.load.show_progress.unwrap_or(true)
    }

    pub fn prune_on_load(&self) -> bool {
        self.analysis.prune_on_load.unwrap_or(false)
    }

    pub fn workers(&self) -> Option<usize> {
        self.analysis.workers
    }

    /// Pruning rule from the configured type names, defaults filling gaps
    pub fn namespace_rule(&self) -> NamespaceRule {
        let defaults = NamespaceRule::default();
        NamespaceRule::new(
            self.analysis
                .namespace_types
                .clone()
                .unwrap_or_else(|| defaults.namespace_types().to_vec()),
            self.analysis
                .table_types
                .clone()
                .unwrap_or_else(|| defaults.table_types().to_vec()),
        )
    }

    /// Initialize user config directory and create example config
    pub fn init_user_config() -> Result<PathBuf> {
        let config_path = Self::user_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if !config_path.exists() {
            let example = r#"# heapscope user configuration

[load]
# show_progress = true

[analysis]
# Types that own a namespace, and the types of their attribute tables.
# Table edges pointing at another namespace owner are cut by --prune.
# namespace_types = ["module"]
# table_types = ["dict"]

# Always prune before computing total sizes
# prune_on_load = false

# Worker threads for compute passes (1-64)
# workers = 8
"#;
            std::fs::write(&config_path, example)?;
        }

        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = UserConfig::default();
        assert!(config.show_progress());
        assert!(!config.prune_on_load());
        assert_eq!(config.workers(), None);
        assert_eq!(config.namespace_rule(), NamespaceRule::default());
    }

    #[test]
    fn test_toml_parsing() {
        let config = UserConfig::from_toml_str(
            r#"
[load]
show_progress = false

[analysis]
namespace_types = ["module", "package"]
prune_on_load = true
workers = 4
"#,
        )
        .unwrap();
        assert!(!config.show_progress());
        assert!(config.prune_on_load());
        assert_eq!(config.workers(), Some(4));
        let rule = config.namespace_rule();
        assert_eq!(rule.namespace_types(), &["module", "package"]);
        assert_eq!(rule.table_types(), &["dict"]);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(UserConfig::from_toml_str("[analysis]\nworkers = \"many\"").is_err());
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = UserConfig::from_toml_str("[analysis]\nworkers = 2\nprune_on_load = true").unwrap();
        base.merge(UserConfig::from_toml_str("[analysis]\nworkers = 16").unwrap());
        assert_eq!(base.workers(), Some(16));
        assert!(base.prune_on_load());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([("HEAPSCOPE_NO_PROGRESS", "1"), ("HEAPSCOPE_WORKERS", "12")]);
        let mut config = UserConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert!(!config.show_progress());
        assert_eq!(config.workers(), Some(12));
    }

    #[test]
    fn test_bad_env_values_ignored() {
        let env: HashMap<&str, &str> =
            HashMap::from([("HEAPSCOPE_NO_PROGRESS", "0"), ("HEAPSCOPE_WORKERS", "zero")]);
        let mut config = UserConfig::from_toml_str("[analysis]\nworkers = 3").unwrap();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert!(config.show_progress());
        assert_eq!(config.workers(), Some(3));
    }

    #[test]
    fn test_out_of_range_workers_ignored() {
        for file in ["[analysis]\nworkers = 0", "[analysis]\nworkers = 100000"] {
            let mut config = UserConfig::from_toml_str("[analysis]\nworkers = 4").unwrap();
            config.merge(UserConfig::from_toml_str(file).unwrap());
            assert_eq!(config.workers(), Some(4), "{file}");
        }

        for value in ["0", "65", "100000"] {
            let mut config = UserConfig::default();
            config.apply_env(|k| (k == "HEAPSCOPE_WORKERS").then(|| value.to_string()));
            assert_eq!(config.workers(), None, "HEAPSCOPE_WORKERS={value}");
        }
    }
}
