use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchwabProviderConfig {
    pub base_url: String,
    /// Hashed account number used in trader API paths.
    pub account_id: String,
    /// Pre-acquired API access token, sent as a bearer header when set.
    /// Obtaining and refreshing tokens happens outside this program.
    pub access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct BrokerConfig {
    pub schwab: Option<SchwabProviderConfig>,
}

fn default_dry_run() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Relative target weights by symbol; normalized by their sum.
    pub allocation: HashMap<String, f64>,
    /// When true, plans are reported but no order leaves the process.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    #[serde(default)]
    pub broker: BrokerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "codito", "rebal")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Target weights keyed by uppercased symbol; duplicate spellings of
    /// the same symbol merge by summing their weights.
    pub fn target_allocation(&self) -> HashMap<String, f64> {
        let mut targets = HashMap::new();
        for (symbol, weight) in &self.allocation {
            *targets
                .entry(symbol.trim().to_uppercase())
                .or_insert(0.0) += *weight;
        }
        targets
    }
}
