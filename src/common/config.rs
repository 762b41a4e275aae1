//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::{config_path, log_dir};
use super::{Error, Result};
use crate::tour::{Edition, Platform, RunSettings};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Default eligibility context
    #[serde(default)]
    pub defaults: Defaults,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Timeout settings in milliseconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// How long a step waits for its trigger before the run fails
    #[serde(default = "default_step_timeout")]
    pub step_timeout_ms: u64,

    /// Upper bound between two trigger checks when no mutation is observed
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            step_timeout_ms: default_step_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_step_timeout() -> u64 {
    10_000
}
fn default_poll_interval() -> u64 {
    100
}

/// Default settings
#[derive(Debug, Deserialize, Default)]
pub struct Defaults {
    /// Product edition assumed when `--edition` is not given
    #[serde(default)]
    pub edition: Edition,

    /// Device class assumed when `--platform` is not given
    #[serde(default)]
    pub platform: Platform,
}

/// Logging configuration
#[derive(Debug, Deserialize, Default)]
pub struct LoggingConfig {
    /// Also write logs to this file; relative paths live under the log directory
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Absolute path of the log file, if file logging is enabled
    pub fn resolved_file(&self) -> Option<PathBuf> {
        let file = self.file.as_ref()?;
        if file.is_absolute() {
            return Some(file.clone());
        }
        log_dir().map(|dir| dir.join(file))
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        if config.timeouts.poll_interval_ms == 0 {
            return Err(Error::Config(
                "timeouts.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }

    /// Runner settings derived from the timeout section
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            step_timeout: Duration::from_millis(self.timeouts.step_timeout_ms),
            poll_interval: Duration::from_millis(self.timeouts.poll_interval_ms),
        }
    }
}
