//! Configuration types and structures.

use crate::automation::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_CONTENT_BYTES, DEFAULT_MAX_PATTERN_LEN, EngineLimits,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Default port for the HTTP API.
pub const DEFAULT_PORT: u16 = 31995;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub automation: AutomationConfig,

    #[serde(default)]
    pub board: BoardConfig,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the HTTP API binds to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port for the HTTP API (default: 31995).
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kanban/kanban.db")
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Automation rule engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Run rules on task create/update (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Distinct (user, content) keys kept in the execution cache (default: 1000).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Longest accepted rule pattern in bytes; longer rules are skipped (default: 1024).
    #[serde(default = "default_max_pattern_len")]
    pub max_pattern_len: usize,

    /// Largest task text evaluated against rules, in bytes (default: 65536).
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: usize,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_capacity: default_cache_capacity(),
            max_pattern_len: default_max_pattern_len(),
            max_content_bytes: default_max_content_bytes(),
        }
    }
}

impl AutomationConfig {
    pub fn limits(&self) -> EngineLimits {
        EngineLimits {
            max_pattern_len: self.max_pattern_len,
            max_content_bytes: self.max_content_bytes,
        }
    }
}

/// Board settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Columns created the first time a user with no columns loads the
    /// board. Empty disables seeding.
    #[serde(default = "default_columns")]
    pub default_columns: Vec<String>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            default_columns: default_columns(),
        }
    }
}

/// Column titles seeded onto an empty board.
pub const DEFAULT_COLUMNS: [&str; 4] = ["To Do", "In Progress", "Testing", "Done"];

pub fn default_columns() -> Vec<String> {
    DEFAULT_COLUMNS.iter().map(|title| title.to_string()).collect()
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_max_pattern_len() -> usize {
    DEFAULT_MAX_PATTERN_LEN
}

fn default_max_content_bytes() -> usize {
    DEFAULT_MAX_CONTENT_BYTES
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.bind_addr().to_string(), "127.0.0.1:31995");
        assert!(config.automation.enabled);
        assert_eq!(config.automation.cache_capacity, 1000);
        assert_eq!(config.automation.limits(), EngineLimits::default());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str(
            "automation:\n  cache_capacity: 10\nserver:\n  port: 8080\n",
        )
        .unwrap();
        assert_eq!(config.automation.cache_capacity, 10);
        assert!(config.automation.enabled);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.db_path, PathBuf::from("kanban/kanban.db"));
        assert_eq!(config.board.default_columns.len(), DEFAULT_COLUMNS.len());
    }

    #[test]
    fn test_empty_default_columns_disable_seeding() {
        let config: Config = serde_yaml::from_str("board:\n  default_columns: []\n").unwrap();
        assert!(config.board.default_columns.is_empty());
    }
}
