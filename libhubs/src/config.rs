//! Configuration management for Hubs

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::logging::LoggingConfig;
use crate::types::{SortMode, ViewMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST service, e.g. `https://hubs.example.org/`
    pub endpoint: String,
    /// Per-request timeout applied by the HTTP client
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: String,
}

/// Fallback preferences used when nothing has been persisted yet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub sort: SortMode,
    #[serde(default)]
    pub view: ViewMode,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_reply_page_size")]
    pub reply_page_size: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    20
}

fn default_reply_page_size() -> u32 {
    10
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            sort: SortMode::default(),
            view: ViewMode::default(),
            page_size: default_page_size(),
            reply_page_size: default_reply_page_size(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            api: ApiConfig {
                endpoint: "http://localhost:8080/".to_string(),
                timeout_secs: default_timeout_secs(),
            },
            storage: StorageConfig {
                path: "~/.local/share/hubs/state.json".to_string(),
            },
            defaults: DefaultsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Check fields that serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        if self.api.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField("api.endpoint".to_string()).into());
        }
        if url::Url::parse(&self.api.endpoint).is_err() {
            return Err(ConfigError::MissingField(format!(
                "api.endpoint (not a valid URL: {})",
                self.api.endpoint
            ))
            .into());
        }
        if self.storage.path.trim().is_empty() {
            return Err(ConfigError::MissingField("storage.path".to_string()).into());
        }
        if !self.logging.is_valid_level() {
            return Err(ConfigError::MissingField(format!(
                "logging.level (not a valid filter: {})",
                self.logging.level
            ))
            .into());
        }
        Ok(())
    }

    /// Storage path with `~` and environment variables expanded
    pub fn storage_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.storage.path).map_err(|e| {
            ConfigError::MissingField(format!("storage.path (cannot expand: {})", e))
        })?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("HUBS_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("hubs").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("hubs"))
}
