//! Buffered playback configuration of the view
//!
//! The host writes properties in any order, usually before any source is
//! set. They all land here first; the view then pushes the whole set to the
//! engine handle when one exists.

use crate::engine::{BufferLimits, EngineOptions, ResizeMode};
use crate::utils::config::{LowLatencyConfig, PlaybackDefaults};

/// Everything the host has configured on one view
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfiguration {
    /// Source URI
    pub source: Option<String>,

    pub paused: bool,

    pub muted: bool,

    /// Output volume (0.0 to 1.0)
    pub volume: f32,

    /// Playback rate multiplier (1.0 = normal)
    pub rate: f32,

    /// Seek target in seconds not yet handed to the engine
    pub pending_seek: Option<f64>,

    pub resize_mode: ResizeMode,

    /// Engine buffer ceiling, `None` keeps the engine default
    pub max_buffer_size: Option<u64>,

    /// Engine buffer floor, `None` keeps the engine default
    pub min_buffer_size: Option<u64>,

    pub hardware_decoding: bool,

    pub low_latency: bool,
}

impl PlaybackConfiguration {
    pub fn from_defaults(defaults: &PlaybackDefaults) -> Self {
        Self {
            source: None,
            paused: false,
            muted: defaults.muted,
            volume: defaults.volume,
            rate: defaults.rate,
            pending_seek: None,
            resize_mode: defaults.resize_mode,
            max_buffer_size: defaults.max_buffer_size,
            min_buffer_size: defaults.min_buffer_size,
            hardware_decoding: defaults.hardware_decoding,
            low_latency: false,
        }
    }

    pub fn buffer_limits(&self) -> BufferLimits {
        BufferLimits {
            max_buffer_size: self.max_buffer_size,
            min_buffer_size: self.min_buffer_size,
        }
    }

    /// Write the low-latency thresholds into the configuration
    ///
    /// Later explicit buffer or decoding writes still win over the preset.
    pub fn enable_low_latency(&mut self, preset: &LowLatencyConfig) {
        self.low_latency = true;
        self.max_buffer_size = Some(preset.max_buffer_size);
        self.min_buffer_size = Some(preset.min_buffer_size);
        self.hardware_decoding = true;
    }

    /// Options handed to the factory when a handle is created for `uri`
    pub fn creation_options(&self, uri: &str, preset: &LowLatencyConfig) -> EngineOptions {
        let mut options = if self.low_latency {
            EngineOptions::low_latency(preset)
        } else {
            EngineOptions::new()
        };
        options.merge(&EngineOptions::for_source(uri, self.hardware_decoding, self.buffer_limits()));
        options
    }
}

impl Default for PlaybackConfiguration {
    fn default() -> Self {
        Self::from_defaults(&PlaybackDefaults::default())
    }
}
