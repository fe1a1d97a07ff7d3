//! Configuration loader and validator
//!
//! Loads application settings from TOML files in the configs/ directory.

use crate::wiimote::constants::{DEFAULT_FRAME_LEN, READ_TIMEOUT_MS, STATUS_INTERVAL_MS};
use crate::mapping::profile::DEFAULT_PROFILE_NAME;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
}

/// General settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Output frame size used when the transport reports none
    #[serde(default = "default_frame_len")]
    pub frame_len: usize,

    /// Period of the status request timer
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    /// Bounded read timeout; must be shorter than the status interval
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Directory of the JSON profile store
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,

    /// Profile activated at start
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    /// Read factory accelerometer calibration during the handshake
    #[serde(default = "default_true")]
    pub read_calibration: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frame_len: default_frame_len(),
            status_interval_ms: default_status_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            profile_dir: default_profile_dir(),
            default_profile: default_profile_name(),
            read_calibration: true,
        }
    }
}

fn default_frame_len() -> usize { DEFAULT_FRAME_LEN }
fn default_status_interval_ms() -> u64 { STATUS_INTERVAL_MS }
fn default_read_timeout_ms() -> u64 { READ_TIMEOUT_MS }
fn default_profile_dir() -> PathBuf { PathBuf::from("profiles") }
fn default_profile_name() -> String { DEFAULT_PROFILE_NAME.to_string() }
fn default_true() -> bool { true }

impl Settings {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        info!("Loading configuration from: {}", path_ref.display());

        let content = std::fs::read_to_string(path_ref)?;
        let config = Self::from_toml(&content)?;
        info!("✓ Config validation passed");

        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;

        info!("✓ Config parsed successfully");
        debug!("  - Frame length: {}", config.settings.frame_len);
        debug!(
            "  - Status every {} ms, read timeout {} ms",
            config.settings.status_interval_ms, config.settings.read_timeout_ms
        );
        debug!("  - Default profile: '{}'", config.settings.default_profile);

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from configs/default.toml
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load("configs/default.toml")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.settings;

        if s.frame_len < DEFAULT_FRAME_LEN {
            return Err(ConfigError::Invalid(format!(
                "frame_len must be at least {} (got {})",
                DEFAULT_FRAME_LEN, s.frame_len
            )));
        }

        if s.status_interval_ms == 0 {
            return Err(ConfigError::Invalid("status_interval_ms must be positive".into()));
        }

        if s.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid("read_timeout_ms must be positive".into()));
        }

        // The read loop has to wake up between status requests
        if s.read_timeout_ms >= s.status_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "read_timeout_ms ({}) must be shorter than status_interval_ms ({})",
                s.read_timeout_ms, s.status_interval_ms
            )));
        }

        if s.default_profile.trim().is_empty() {
            return Err(ConfigError::Invalid("default_profile cannot be empty".into()));
        }

        Ok(())
    }
}
