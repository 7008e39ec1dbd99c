//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/clicktrail/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/clicktrail/` (~/.config/clicktrail/)
//! - Data: `$XDG_DATA_HOME/clicktrail/` (~/.local/share/clicktrail/)
//! - State/Logs: `$XDG_STATE_HOME/clicktrail/` (~/.local/state/clicktrail/)

use crate::error::{Error, Result};
use crate::heatmap::{ColorScheme, GridParams, TimeRange};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Event buffering and delivery
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Heat map rendering parameters
    #[serde(default)]
    pub heatmap: HeatmapConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Event buffering and delivery configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    /// Collection endpoint (e.g., `https://telemetry.example.com/api/track`)
    pub endpoint: Option<String>,

    /// Bearer token sent with every request (optional)
    pub api_key: Option<String>,

    /// Milliseconds between periodic flushes
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Queue length that triggers a flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of recent events kept for display
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Use the fire-and-forget transport for immediate flushes
    #[serde(default = "default_beacon")]
    pub beacon: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            flush_interval_ms: default_flush_interval_ms(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            history_limit: default_history_limit(),
            beacon: default_beacon(),
        }
    }
}

impl TrackingConfig {
    /// Check if an HTTP transport can be built from this configuration
    pub fn is_ready(&self) -> bool {
        self.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > 500 {
            return Err(Error::Config(
                "tracking.batch_size must be between 1 and 500".to_string(),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(Error::Config(
                "tracking.flush_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the configured flush interval
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

fn default_flush_interval_ms() -> u64 {
    5000
}

fn default_batch_size() -> usize {
    20
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_history_limit() -> usize {
    50
}

fn default_beacon() -> bool {
    true
}

/// Heat map configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HeatmapConfig {
    /// Grid cell size in page units
    #[serde(default = "default_bucket_size")]
    pub bucket_size: f64,

    /// Click count that reaches full intensity
    #[serde(default = "default_threshold")]
    pub threshold: u32,

    /// Opacity of a fully saturated cell
    #[serde(default = "default_max_opacity")]
    pub max_opacity: f64,

    /// Radius of a rendered point
    #[serde(default = "default_point_radius")]
    pub point_radius: u32,

    #[serde(default)]
    pub color_scheme: ColorScheme,

    #[serde(default)]
    pub time_range: TimeRange,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            bucket_size: default_bucket_size(),
            threshold: default_threshold(),
            max_opacity: default_max_opacity(),
            point_radius: default_point_radius(),
            color_scheme: ColorScheme::default(),
            time_range: TimeRange::default(),
        }
    }
}

impl HeatmapConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !(self.bucket_size.is_finite() && self.bucket_size > 0.0) {
            return Err(Error::Config(
                "heatmap.bucket_size must be a positive number".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_opacity) {
            return Err(Error::Config(
                "heatmap.max_opacity must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Grid parameters for [`crate::heatmap::compute_grid`]
    pub fn grid_params(&self) -> GridParams {
        GridParams {
            bucket_size: self.bucket_size,
            threshold: self.threshold,
        }
    }
}

fn default_bucket_size() -> f64 {
    5.0
}

fn default_threshold() -> u32 {
    10
}

fn default_max_opacity() -> f64 {
    0.8
}

fn default_point_radius() -> u32 {
    20
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.tracking.validate()?;
        config.heatmap.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/clicktrail/config.toml` (~/.config/clicktrail/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("clicktrail").join("config.toml")
    }

    /// Returns the data directory path (for persisted identity)
    ///
    /// `$XDG_DATA_HOME/clicktrail/` (~/.local/share/clicktrail/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("clicktrail")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/clicktrail/` (~/.local/state/clicktrail/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("clicktrail")
    }

    /// Returns the client storage file path
    ///
    /// `$XDG_DATA_HOME/clicktrail/storage.json`
    pub fn storage_path() -> PathBuf {
        Self::data_dir().join("storage.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.tracking.endpoint.is_none());
        assert_eq!(config.tracking.flush_interval_ms, 5000);
        assert_eq!(config.tracking.batch_size, 20);
        assert_eq!(config.tracking.history_limit, 50);
        assert!(config.tracking.beacon);
        assert_eq!(config.heatmap.bucket_size, 5.0);
        assert_eq!(config.heatmap.threshold, 10);
        assert_eq!(config.heatmap.max_opacity, 0.8);
        assert_eq!(config.heatmap.color_scheme, ColorScheme::Classic);
        assert_eq!(config.heatmap.time_range, TimeRange::All);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[tracking]
endpoint = "https://telemetry.example.com/api/track"
batch_size = 50
flush_interval_ms = 2000

[heatmap]
bucket_size = 10
threshold = 3
color_scheme = "viridis"
time_range = "week"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert!(config.tracking.is_ready());
        assert_eq!(config.tracking.batch_size, 50);
        assert_eq!(config.tracking.flush_interval(), Duration::from_millis(2000));
        assert_eq!(config.tracking.timeout_secs, 30);
        assert_eq!(config.heatmap.grid_params().bucket_size, 10.0);
        assert_eq!(config.heatmap.grid_params().threshold, 3);
        assert_eq!(config.heatmap.color_scheme, ColorScheme::Viridis);
        assert_eq!(config.heatmap.time_range, TimeRange::Week);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_tracking_config_validation() {
        let config = TrackingConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.is_ready());

        let config = TrackingConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrackingConfig {
            flush_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrackingConfig {
            endpoint: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!config.is_ready());
    }

    #[test]
    fn test_heatmap_config_validation() {
        assert!(HeatmapConfig::default().validate().is_ok());

        let config = HeatmapConfig {
            bucket_size: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HeatmapConfig {
            max_opacity: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tracking]\nbatch_size = 0\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_paths_are_namespaced() {
        assert!(Config::config_path().ends_with("clicktrail/config.toml"));
        assert!(Config::storage_path().ends_with("clicktrail/storage.json"));
        assert!(Config::state_dir().ends_with("clicktrail"));
    }
}
