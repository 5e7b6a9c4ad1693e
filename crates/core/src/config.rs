//! Configuration types shared across crates.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Catalog configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory holding form definition files and media bundles.
    #[serde(default = "default_forms_dir")]
    pub forms_dir: PathBuf,
    /// Directory holding derived cache artifacts.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Metadata database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Metadata database settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file path.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// SQLite busy timeout in seconds.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_forms_dir() -> PathBuf {
    PathBuf::from("./data/forms")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/cache")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/metadata/forms.db")
}

fn default_busy_timeout_secs() -> u64 {
    5
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            forms_dir: default_forms_dir(),
            cache_dir: default_cache_dir(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl CatalogConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.forms_dir.as_os_str().is_empty() {
            return Err("forms_dir must not be empty".to_string());
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir must not be empty".to_string());
        }
        if self.database.path.as_os_str().is_empty() {
            return Err("database.path must not be empty".to_string());
        }
        if self.forms_dir == self.cache_dir {
            return Err("forms_dir and cache_dir must be distinct directories".to_string());
        }
        Ok(())
    }

    /// Parse and validate a configuration from TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate().map_err(Error::Config)?;
        Ok(config)
    }

    /// Load a configuration file from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&raw)
    }
}
