//! Configuration management for playerbridge
//!
//! This module handles loading the bridge defaults from config files and
//! environment variables. Every section is `#[serde(default)]`, so a file only
//! needs to name the keys it overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::ResizeMode;
use crate::utils::error::{BridgeError, IntoBridgeError, Result};

/// Main bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Initial values for a fresh playback configuration
    pub playback: PlaybackDefaults,

    /// Thresholds applied by the low-latency setup
    pub low_latency: LowLatencyConfig,

    /// Progress event cadence
    pub progress: ProgressConfig,

    /// General settings
    pub general: GeneralConfig,
}

/// Defaults a view starts from before any property is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackDefaults {
    /// Initial volume (0.0 - 1.0)
    pub volume: f32,

    /// Initial playback rate (1.0 = normal)
    pub rate: f32,

    /// Start muted
    pub muted: bool,

    /// Initial resize mode
    pub resize_mode: ResizeMode,

    /// Prefer the hardware decode path
    pub hardware_decoding: bool,

    /// Engine buffer ceiling (engine-defined units), unset = engine default
    pub max_buffer_size: Option<u64>,

    /// Engine buffer floor (engine-defined units), unset = engine default
    pub min_buffer_size: Option<u64>,
}

/// Low-latency tuning handed to the engine for live sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowLatencyConfig {
    /// Buffer ceiling while in low-latency mode
    pub max_buffer_size: u64,

    /// Buffer floor (frames) before playback starts
    pub min_buffer_size: u64,

    /// Bytes probed before stream detection finishes
    pub probe_size: u64,

    /// Microseconds analyzed before stream detection finishes
    pub analyze_duration_us: u64,

    /// Upper bound of cached media before the engine starts dropping
    pub max_cached_duration_ms: u64,

    /// Allow the engine to drop late video frames
    pub drop_frames: bool,
}

/// Progress event cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Minimum time between two progress events
    pub interval_ms: u64,
}

/// General bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            volume: 1.0,
            rate: 1.0,
            muted: false,
            resize_mode: ResizeMode::Contain,
            hardware_decoding: true,
            max_buffer_size: None,
            min_buffer_size: None,
        }
    }
}

impl Default for LowLatencyConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 256 * 1024,
            min_buffer_size: 2,
            probe_size: 32 * 1024,
            analyze_duration_us: 100_000,
            max_cached_duration_ms: 1_000,
            drop_frames: true,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self { interval_ms: 250 }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl ProgressConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/playerbridge/config.toml on Linux)
    /// 3. User config file (~/.config/playerbridge/config.toml on Linux)
    /// 4. Environment variables (PLAYERBRIDGE_* prefix)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(system_path) = Self::system_config_path() {
            if system_path.exists() {
                config.merge_from_file(&system_path)?;
            }
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                config.merge_from_file(&user_path)?;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load defaults, then one explicit file, then environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.merge_from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to user config file
    pub fn save(&self) -> Result<()> {
        let path = Self::user_config_path()
            .ok_or_else(|| BridgeError::Config("Cannot determine user config path".to_string()))?;
        self.save_to(&path)
    }

    /// Save configuration to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).config_err("Failed to create config directory")?;
        }

        let toml = toml::to_string_pretty(self).config_err("Failed to serialize config")?;
        std::fs::write(path, toml).config_err("Failed to write config file")?;

        Ok(())
    }

    /// Merge configuration from a TOML file
    ///
    /// Sections and keys missing from the file keep their current values.
    fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path).config_err("Failed to read config file")?;

        let mut base = toml::Value::try_from(&*self).config_err("Failed to serialize config")?;
        let overlay: toml::Value = toml::from_str(&contents).config_err("Failed to parse config file")?;
        merge_values(&mut base, overlay);

        *self = base.try_into().config_err("Invalid config file")?;

        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(volume) = std::env::var("PLAYERBRIDGE_VOLUME") {
            self.playback.volume = volume.parse()
                .map_err(|_| BridgeError::Config("Invalid PLAYERBRIDGE_VOLUME".to_string()))?;
        }

        if let Ok(hw) = std::env::var("PLAYERBRIDGE_HARDWARE_DECODING") {
            self.playback.hardware_decoding = hw.parse()
                .map_err(|_| BridgeError::Config("Invalid PLAYERBRIDGE_HARDWARE_DECODING".to_string()))?;
        }

        if let Ok(interval) = std::env::var("PLAYERBRIDGE_PROGRESS_INTERVAL_MS") {
            self.progress.interval_ms = interval.parse()
                .map_err(|_| BridgeError::Config("Invalid PLAYERBRIDGE_PROGRESS_INTERVAL_MS".to_string()))?;
        }

        if let Ok(max) = std::env::var("PLAYERBRIDGE_LOW_LATENCY_MAX_BUFFER") {
            self.low_latency.max_buffer_size = max.parse()
                .map_err(|_| BridgeError::Config("Invalid PLAYERBRIDGE_LOW_LATENCY_MAX_BUFFER".to_string()))?;
        }

        if let Ok(log_level) = std::env::var("PLAYERBRIDGE_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.playback.volume) {
            return Err(BridgeError::Config("Playback volume must be between 0.0 and 1.0".to_string()));
        }

        if !self.playback.rate.is_finite() || self.playback.rate <= 0.0 {
            return Err(BridgeError::Config("Playback rate must be positive".to_string()));
        }

        if let (Some(min), Some(max)) = (self.playback.min_buffer_size, self.playback.max_buffer_size) {
            if min > max {
                return Err(BridgeError::Config("min_buffer_size exceeds max_buffer_size".to_string()));
            }
        }

        if self.low_latency.max_buffer_size == 0 {
            return Err(BridgeError::Config("Low-latency max_buffer_size must be non-zero".to_string()));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(BridgeError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level,
                valid_log_levels
            )));
        }

        Ok(())
    }

    /// Get system config file path
    fn system_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return Some(PathBuf::from("/etc/playerbridge/config.toml"));

        #[cfg(target_os = "windows")]
        return std::env::var("PROGRAMDATA").ok()
            .map(|p| PathBuf::from(p).join("playerbridge").join("config.toml"));

        #[cfg(target_os = "macos")]
        return Some(PathBuf::from("/Library/Application Support/playerbridge/config.toml"));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("playerbridge").join("config.toml"))
    }
}

fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
