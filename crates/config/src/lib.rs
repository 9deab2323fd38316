#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for ferry
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/ferry/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary)

pub mod constants;

use constants::{
    APP_DIR, CONFIG_FILE, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_WORKERS,
    ENV_ARCHIVES, ENV_DOWNLOAD_URL, ENV_INDEX, ENV_QUEUE_CAPACITY, ENV_STATE_DIR, ENV_WORKERS,
};
use ferry_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub verify: VerifyConfig,
}

/// Concurrency and lifecycle settings for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Root of the registry index checkout
    pub index: Option<PathBuf>,
    /// Root of the mirrored archive tree
    pub archives: Option<PathBuf>,
    /// Where checkpoint and lock files live
    pub state_dir: Option<PathBuf>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Download URL template, overrides the index `config.json`
    pub download_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64, // seconds
    pub user_agent: Option<String>,
}

/// Verification settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VerifyConfig {
    /// Skip versions whose archive is absent instead of reporting them
    #[serde(default)]
    pub skip_missing: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            download_url: None,
            timeout: 300, // 5 minutes
            connect_timeout: 30,
            user_agent: None,
        }
    }
}

// Default value functions for serde
fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_shutdown_grace_secs() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_SECS
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_connect_timeout() -> u64 {
    30
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        tracing::debug!(path = %path.display(), "loaded config file");

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(workers) = std::env::var(ENV_WORKERS) {
            self.general.workers = workers.parse().map_err(|_| ConfigError::InvalidValue {
                field: ENV_WORKERS.to_string(),
                value: workers,
            })?;
        }

        if let Ok(capacity) = std::env::var(ENV_QUEUE_CAPACITY) {
            self.general.queue_capacity =
                capacity.parse().map_err(|_| ConfigError::InvalidValue {
                    field: ENV_QUEUE_CAPACITY.to_string(),
                    value: capacity,
                })?;
        }

        if let Some(index) = std::env::var_os(ENV_INDEX) {
            self.paths.index = Some(PathBuf::from(index));
        }

        if let Some(archives) = std::env::var_os(ENV_ARCHIVES) {
            self.paths.archives = Some(PathBuf::from(archives));
        }

        if let Some(state_dir) = std::env::var_os(ENV_STATE_DIR) {
            self.paths.state_dir = Some(PathBuf::from(state_dir));
        }

        if let Ok(url) = std::env::var(ENV_DOWNLOAD_URL) {
            self.network.download_url = Some(url);
        }

        Ok(())
    }

    /// Check cross-field constraints after all sources are merged
    ///
    /// # Errors
    ///
    /// Returns an error if a concurrency setting is zero or a required path is missing.
    pub fn validate(&self) -> Result<(), Error> {
        if self.general.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "general.workers".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.general.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "general.queue_capacity".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        self.index_path()?;
        self.archives_path()?;
        Ok(())
    }

    /// Get the index root
    ///
    /// # Errors
    ///
    /// Returns an error if no index path was configured.
    pub fn index_path(&self) -> Result<PathBuf, Error> {
        self.paths.index.clone().ok_or_else(|| {
            ConfigError::MissingField {
                field: "paths.index".to_string(),
            }
            .into()
        })
    }

    /// Get the archive root
    ///
    /// # Errors
    ///
    /// Returns an error if no archive path was configured.
    pub fn archives_path(&self) -> Result<PathBuf, Error> {
        self.paths.archives.clone().ok_or_else(|| {
            ConfigError::MissingField {
                field: "paths.archives".to_string(),
            }
            .into()
        })
    }

    /// Get the state directory (with default)
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.paths.state_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|dir| dir.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from(".ferry"))
        })
    }

    /// Grace period granted to in-flight tasks after cancellation
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.general.shutdown_grace_secs)
    }
}
