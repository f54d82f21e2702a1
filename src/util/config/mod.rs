//! guestloop configuration
//!
//! Host configuration with layered overrides.
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. Environment variables (GUESTLOOP_WORKERS, GUESTLOOP_LOG)
//! 3. Config file (--config, or ~/.config/guestloop/config.ron)
//! 4. Default values
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use guestloop::util::config::load_user_config;
//!
//! // Load user-level config (defaults if the file does not exist)
//! let config = load_user_config().unwrap();
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embed::{StartConfig, DEFAULT_SEARCH_PATH_VAR};
use crate::util::logger::LogLevel;

/// Environment variable overriding [`HostConfig::worker_loops`].
pub const WORKERS_ENV: &str = "GUESTLOOP_WORKERS";

/// Environment variable overriding [`HostConfig::log_level`].
pub const LOG_ENV: &str = "GUESTLOOP_LOG";

/// Host-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Options passed to the launcher
    #[serde(default)]
    pub start: StartConfig,
    /// Variable the module search path is exported through
    #[serde(default = "default_search_path_var")]
    pub search_path_var: String,
    /// Loops to run next to the main loop
    #[serde(default)]
    pub worker_loops: usize,
    /// Log level name
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_search_path_var() -> String {
    DEFAULT_SEARCH_PATH_VAR.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            start: StartConfig::default(),
            search_path_var: default_search_path_var(),
            worker_loops: 0,
            log_level: default_log_level(),
        }
    }
}

impl HostConfig {
    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(WORKERS_ENV) {
            self.worker_loops = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: WORKERS_ENV.to_string(),
                    value,
                })?;
        }
        if let Some(value) = lookup(LOG_ENV) {
            value
                .parse::<LogLevel>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: LOG_ENV.to_string(),
                    value: value.clone(),
                })?;
            self.log_level = value;
        }
        Ok(())
    }

    /// Parsed log level, INFO if the name is not recognized.
    pub fn log_level(&self) -> LogLevel {
        self.log_level.parse().unwrap_or(LogLevel::Info)
    }
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    // Try XDG config directory on Unix
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("guestloop"));
    }

    // Fallback to ~/.config/guestloop
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("guestloop"));
    }

    // On Windows, try %APPDATA%
    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("guestloop"));
    }

    None
}

/// Get the user config file path (~/.config/guestloop/config.ron)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.ron"))
}

/// Load configuration from a RON file
pub fn load_config(path: &Path) -> Result<HostConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(ron::from_str(&content)?)
}

/// Load user-level configuration
/// Returns default config if file doesn't exist
pub fn load_user_config() -> Result<HostConfig, ConfigError> {
    match get_config_path() {
        Some(path) if path.exists() => load_config(&path),
        _ => Ok(HostConfig::default()),
    }
}

/// Render configuration as pretty RON
pub fn to_ron_string(config: &HostConfig) -> Result<String, ConfigError> {
    Ok(ron::ser::to_string_pretty(
        config,
        ron::ser::PrettyConfig::default(),
    )?)
}

/// Save configuration, creating the parent directory if needed
pub fn save_config(
    path: &Path,
    config: &HostConfig,
) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }
    fs::write(path, to_ron_string(config)?)?;
    Ok(())
}

/// Save user-level configuration
pub fn save_user_config(config: &HostConfig) -> Result<PathBuf, ConfigError> {
    let path = get_config_path().ok_or(ConfigError::NoConfigDir)?;
    save_config(&path, config)?;
    Ok(path)
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Config serialize error: {0}")]
    Serialize(#[from] ron::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Cannot determine config directory")]
    NoConfigDir,
}
