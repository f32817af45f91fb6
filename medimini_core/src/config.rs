//! Configuration file support for MediMini.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/medimini/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub user: UserConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DataConfig {
    /// Medications, users and change log
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("data.json")
    }

    /// Timing rules
    pub fn rules_path(&self) -> PathBuf {
        self.data_dir.join("rules.json")
    }
}

/// Active user configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user_id")]
    pub id: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: default_user_id(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("medimini")
}

fn default_user_id() -> String {
    "u1".into()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("medimini").join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if self.user.id.trim().is_empty() {
            return Err(Error::Config("user.id must not be empty".into()));
        }
        Ok(())
    }
}
