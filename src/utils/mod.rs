//! Utility module for playerbridge
//!
//! This module provides common utilities used throughout the bridge:
//! - Error handling with the bridge error taxonomy
//! - Configuration management
//! - Time conversion helpers shared by the view and the demo

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::{Config, GeneralConfig, LowLatencyConfig, PlaybackDefaults, ProgressConfig};
pub use error::{BridgeError, ErrorKind, IntoBridgeError, Result};

use std::time::Duration;

/// Initialize the bridge configuration
///
/// Loads configuration from:
/// 1. Default values
/// 2. System configuration file
/// 3. User configuration file
/// 4. Environment variables
pub fn load_config() -> Result<Config> {
    Config::load()
}

/// Format a duration for display
///
/// Formatted string in the format "HH:MM:SS" or "MM:SS" for durations under an hour
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Convert host seconds into a duration, clamping negatives to zero
///
/// Returns `None` for NaN, infinite, or unrepresentably large input.
pub fn duration_from_secs(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() {
        return None;
    }
    Duration::try_from_secs_f64(seconds.max(0.0)).ok()
}
