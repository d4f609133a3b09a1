use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub shardgraph: ShardgraphConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Shardgraph-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ShardgraphConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Engine limits: batch caps, traversal budgets, page sizes.
///
/// Every graph walk is bounded by these regardless of caller input; callers
/// may ask for less, never more.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Hard cap on items per bulk-create request.
    #[serde(default = "default_max_bulk_items")]
    pub max_bulk_items: usize,
    /// Ceiling on traversal/path-finding depth.
    #[serde(default = "default_max_depth")]
    pub max_traversal_depth: usize,
    /// Ceiling on nodes visited per traversal or path search.
    #[serde(default = "default_max_nodes")]
    pub max_traversal_nodes: usize,
    /// Largest page a single edge query may return.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_bulk_items: default_max_bulk_items(),
            max_traversal_depth: default_max_depth(),
            max_traversal_nodes: default_max_nodes(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_max_bulk_items() -> usize {
    100
}

fn default_max_depth() -> usize {
    10
}

fn default_max_nodes() -> usize {
    1000
}

fn default_max_page_size() -> usize {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in SHARDGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("SHARDGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.limits.max_bulk_items == 0 {
            anyhow::bail!("limits.max_bulk_items must be greater than 0");
        }

        if self.limits.max_traversal_nodes == 0 {
            anyhow::bail!("limits.max_traversal_nodes must be greater than 0");
        }

        if self.limits.max_page_size == 0 {
            anyhow::bail!("limits.max_page_size must be greater than 0");
        }

        if let Some(parent) = self.shardgraph.db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                anyhow::bail!(
                    "db_path parent directory does not exist: {}",
                    parent.display()
                );
            }
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.shardgraph.db_path
    }
}
