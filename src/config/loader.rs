//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Config file tiers, lowest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Project-level config ($CWD/kanban/), or an explicit config file
    Project,
    /// User-level config (~/.kanban/)
    User,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project-level config directory
    pub project_dir: Option<PathBuf>,
    /// User-level config directory
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        // User dir: KANBAN_USER_DIR or ~/.kanban
        let user_dir = std::env::var("KANBAN_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".kanban")));

        // Project dir: KANBAN_PROJECT_DIR or $CWD/kanban
        let project_dir = std::env::var("KANBAN_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("kanban")));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Paths for each tier
    pub paths: ConfigPaths,
    /// Loaded configuration
    config: Config,
    /// Config files that contributed, lowest tier first
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    ///
    /// `KANBAN_CONFIG_PATH` names a single file that replaces tier discovery.
    pub fn load() -> Result<Self> {
        if let Ok(explicit_path) = std::env::var("KANBAN_CONFIG_PATH") {
            return Self::load_file(explicit_path);
        }
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load one explicit config file, then apply environment overrides.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = Config::load(&path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?;
        Self::apply_env_overrides(&mut config)?;
        Ok(Self {
            paths: ConfigPaths::with_dirs(None, None),
            config,
            sources: vec![(ConfigTier::Project, path)],
        })
    }

    /// Load configuration with explicit paths.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        let mut configs: Vec<Value> = Vec::new();
        let mut sources = Vec::new();

        // Tier 1: Defaults (embedded)
        configs.push(serde_json::to_value(Config::default())?);

        // Tier 2: Project config, Tier 3: User config
        let tiers = [
            (ConfigTier::Project, paths.project_dir.as_deref()),
            (ConfigTier::User, paths.user_dir.as_deref()),
        ];
        for (tier, dir) in tiers {
            let Some(dir) = dir else { continue };
            let config_file = dir.join("config.yaml");
            if !config_file.exists() {
                continue;
            }
            match read_yaml(&config_file) {
                Ok(value) => {
                    configs.push(value);
                    sources.push((tier, config_file));
                }
                Err(e) => {
                    warn!(tier = %tier, path = %config_file.display(), error = %e, "Ignoring unreadable config file");
                }
            }
        }

        // Merge all configs
        let merged = deep_merge_all(configs);
        let mut config: Config = serde_json::from_value(merged)?;

        // Tier 4: Environment variable overrides
        Self::apply_env_overrides(&mut config)?;

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    /// Apply environment variable overrides to config.
    fn apply_env_overrides(config: &mut Config) -> Result<()> {
        if let Ok(db_path) = std::env::var("KANBAN_DB_PATH") {
            config.server.db_path = PathBuf::from(db_path);
        }

        if let Ok(host) = std::env::var("KANBAN_HOST") {
            config.server.host = host
                .parse()
                .with_context(|| format!("KANBAN_HOST is not an IP address: {}", host))?;
        }

        if let Ok(port) = std::env::var("KANBAN_PORT") {
            config.server.port = port
                .parse()
                .with_context(|| format!("KANBAN_PORT is not a port number: {}", port))?;
        }

        if let Ok(capacity) = std::env::var("KANBAN_CACHE_CAPACITY") {
            config.automation.cache_capacity = capacity
                .parse()
                .with_context(|| format!("KANBAN_CACHE_CAPACITY is not a number: {}", capacity))?;
        }

        Ok(())
    }

    /// Get mutable access to the configuration (for CLI overrides).
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Config files that were merged, lowest tier first.
    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    let value = serde_yaml::from_str::<Value>(&content)?;
    Ok(value)
}
