//! Configuration loading for geomesh sessions.
//!
//! Configuration is loaded from a TOML file (default: `geomesh.toml`).
//! Every section and field is optional.

use mesh_core::ViewSettings;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::position::WatchOptions;

/// Root configuration for a geomesh session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Channel configuration.
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Position watch configuration.
    #[serde(default)]
    pub position: PositionConfig,
    /// Map view configuration.
    #[serde(default)]
    pub view: ViewConfig,
}

/// Channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Relay address passed to `Channel::connect` (default: "local").
    #[serde(default = "default_channel_address")]
    pub address: String,
}

/// Position watch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionConfig {
    /// Prefer the most accurate fix (default: true).
    #[serde(default = "default_high_accuracy")]
    pub high_accuracy: bool,
    /// Milliseconds to wait for each sample, 0 = forever (default: 5000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum age in milliseconds of a reusable cached fix, 0 = never reuse
    /// (default: 0).
    #[serde(default)]
    pub maximum_age_ms: u64,
}

/// Map view configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    /// Zoom level when recentering on the local peer (default: 16).
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    /// Maximum zoom of the tile layer (default: 19).
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
}

// Default value functions
fn default_channel_address() -> String {
    "local".to_string()
}

fn default_high_accuracy() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_zoom() -> u8 {
    mesh_core::coordinator::DEFAULT_ZOOM
}

fn default_max_zoom() -> u8 {
    mesh_core::coordinator::DEFAULT_MAX_ZOOM
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            address: default_channel_address(),
        }
    }
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            high_accuracy: default_high_accuracy(),
            timeout_ms: default_timeout_ms(),
            maximum_age_ms: 0,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom: default_zoom(),
            max_zoom: default_max_zoom(),
        }
    }
}

impl PositionConfig {
    /// Watch options for the position source adapter.
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            high_accuracy: self.high_accuracy,
            timeout: Duration::from_millis(self.timeout_ms),
            maximum_age: Duration::from_millis(self.maximum_age_ms),
        }
    }
}

impl ViewConfig {
    /// View settings for the coordinator (zoom clamped to `max_zoom`).
    pub fn settings(&self) -> ViewSettings {
        ViewSettings::new(self.zoom, self.max_zoom)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
