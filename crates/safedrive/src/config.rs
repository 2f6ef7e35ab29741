//! Configuration management for safedrive.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "safedrive";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SAFEDRIVE_`, sections split by `__`)
/// 2. TOML config file at `~/.config/safedrive/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Notification log retention.
    pub retention: RetentionConfig,
    /// Rendering of notification timestamps.
    pub display: DisplayConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Path prefix the prototype and user routes are mounted under.
    pub base_path: String,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding all persisted documents.
    /// Defaults to `~/.local/share/safedrive`
    pub data_dir: Option<PathBuf>,
    /// File name of the sensor snapshot document.
    pub snapshot_file: String,
    /// File name of the notification log document.
    pub notifications_file: String,
    /// File name of the user database.
    pub users_database: String,
}

/// Notification log retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Maximum number of notifications kept in the log.
    /// Set to 0 for unlimited.
    pub max_notifications: usize,
    /// Maximum age of notifications kept in the log, in days.
    /// Set to 0 for unlimited.
    pub max_age_days: u32,
}

/// Timestamp rendering configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Fixed UTC offset in minutes for rendered timestamps.
    /// Unset means the server's local time zone.
    pub utc_offset_minutes: Option<i32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            base_path: "/api".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None, // Will be resolved to default at runtime
            snapshot_file: "prototype_data.json".to_string(),
            notifications_file: "notifications.json".to_string(),
            users_database: "users.db".to_string(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_notifications: 10_000,
            max_age_days: 30,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("SAFEDRIVE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let base = &self.server.base_path;
        if !base.starts_with('/') || (base.len() > 1 && base.ends_with('/')) {
            return Err(Error::ConfigValidation {
                message: format!("base_path must start with '/' and not end with '/': {base}"),
            });
        }

        let storage = &self.storage;
        for (key, name) in [
            ("snapshot_file", &storage.snapshot_file),
            ("notifications_file", &storage.notifications_file),
            ("users_database", &storage.users_database),
        ] {
            if name.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: format!("{key} cannot be empty"),
                });
            }
        }

        if storage.snapshot_file == storage.notifications_file {
            return Err(Error::ConfigValidation {
                message: format!(
                    "snapshot_file and notifications_file must differ (both are {})",
                    storage.snapshot_file
                ),
            });
        }

        if let Some(minutes) = self.display.utc_offset_minutes {
            if self.display_offset().is_none() {
                return Err(Error::ConfigValidation {
                    message: format!("utc_offset_minutes out of range: {minutes}"),
                });
            }
        }

        Ok(())
    }

    /// Get the data directory, resolving defaults if not set.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Path of the sensor snapshot document.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.snapshot_file)
    }

    /// Path of the notification log document.
    #[must_use]
    pub fn notifications_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.notifications_file)
    }

    /// Path of the user database.
    #[must_use]
    pub fn users_database_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.users_database)
    }

    /// Get the notification max age as a Duration.
    #[must_use]
    pub fn max_notification_age(&self) -> Option<Duration> {
        if self.retention.max_age_days == 0 {
            None
        } else {
            Some(Duration::from_secs(
                u64::from(self.retention.max_age_days) * 24 * 60 * 60,
            ))
        }
    }

    /// The configured display offset, if one is set and in range.
    #[must_use]
    pub fn display_offset(&self) -> Option<FixedOffset> {
        self.display
            .utc_offset_minutes
            .and_then(|minutes| minutes.checked_mul(60))
            .and_then(FixedOffset::east_opt)
    }
}
