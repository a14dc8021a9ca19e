//! Engine option sets
//!
//! Engines of this family take their tuning as categorized key/value pairs
//! before the source is opened (some are also settable at runtime). This
//! module builds those sets: network defaults for a source, the buffer limits
//! from the playback configuration, and the low-latency preset for live
//! streams.

use std::fmt;

use crate::engine::BufferLimits;
use crate::utils::config::LowLatencyConfig;

/// Which engine layer an option is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionCategory {
    /// Container/protocol layer
    Format,

    /// Decoder layer
    Codec,

    /// Player core
    Player,
}

/// Option value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::Str(v) => write!(f, "{}", v),
        }
    }
}

/// Ordered option set; setting an existing key replaces its value in place
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOptions {
    entries: Vec<(OptionCategory, String, OptionValue)>,
}

const NETWORK_SCHEMES: &[&str] = &["http", "https", "rtmp", "rtmps", "rtsp", "rtsps", "srt", "udp", "tcp"];

/// Scheme of a URI, lowercased, if it has one
pub fn uri_scheme(uri: &str) -> Option<String> {
    let (scheme, _) = uri.split_once("://")?;
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}

/// Whether the engine will reach the source over the network
pub fn is_network_uri(uri: &str) -> bool {
    uri_scheme(uri).is_some_and(|s| NETWORK_SCHEMES.contains(&s.as_str()))
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Baseline options for opening `uri`
    pub fn for_source(uri: &str, hardware_decoding: bool, limits: BufferLimits) -> Self {
        let mut options = Self::new();

        if is_network_uri(uri) {
            options.set_int(OptionCategory::Format, "reconnect", 1);
            options.set_int(OptionCategory::Format, "dns_cache_clear", 1);
            if uri_scheme(uri).as_deref().is_some_and(|s| s.starts_with("rtsp")) {
                options.set_str(OptionCategory::Format, "rtsp_transport", "tcp");
            }
        }

        options.set_int(OptionCategory::Player, "hwaccel", hardware_decoding as i64);
        options.set_buffer_limits(limits);
        options
    }

    /// Preset for minimum end-to-end latency on live sources
    pub fn low_latency(config: &LowLatencyConfig) -> Self {
        let mut options = Self::new();
        options.set_str(OptionCategory::Format, "fflags", "nobuffer");
        options.set_int(OptionCategory::Format, "probesize", config.probe_size as i64);
        options.set_int(OptionCategory::Format, "analyzeduration", config.analyze_duration_us as i64);
        options.set_int(OptionCategory::Player, "packet-buffering", 0);
        options.set_int(OptionCategory::Player, "infbuf", 1);
        options.set_int(OptionCategory::Player, "framedrop", config.drop_frames as i64);
        options.set_int(OptionCategory::Player, "max_cached_duration", config.max_cached_duration_ms as i64);
        options.set_int(OptionCategory::Player, "hwaccel", 1);
        options.set_buffer_limits(BufferLimits {
            max_buffer_size: Some(config.max_buffer_size),
            min_buffer_size: Some(config.min_buffer_size),
        });
        options
    }

    pub fn set_int(&mut self, category: OptionCategory, key: &str, value: i64) {
        self.set(category, key, OptionValue::Int(value));
    }

    pub fn set_str(&mut self, category: OptionCategory, key: &str, value: &str) {
        self.set(category, key, OptionValue::Str(value.to_string()));
    }

    fn set(&mut self, category: OptionCategory, key: &str, value: OptionValue) {
        match self.entries.iter_mut().find(|(c, k, _)| *c == category && k == key) {
            Some(entry) => entry.2 = value,
            None => self.entries.push((category, key.to_string(), value)),
        }
    }

    fn set_buffer_limits(&mut self, limits: BufferLimits) {
        if let Some(max) = limits.max_buffer_size {
            self.set_int(OptionCategory::Player, "max-buffer-size", max as i64);
        }
        if let Some(min) = limits.min_buffer_size {
            self.set_int(OptionCategory::Player, "min-frames", min as i64);
        }
    }

    pub fn get(&self, category: OptionCategory, key: &str) -> Option<&OptionValue> {
        self.entries
            .iter()
            .find(|(c, k, _)| *c == category && k == key)
            .map(|(_, _, v)| v)
    }

    /// Overlay `other`, its values winning on conflicts
    pub fn merge(&mut self, other: &EngineOptions) {
        for (category, key, value) in &other.entries {
            self.set(*category, key, value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionCategory, &str, &OptionValue)> {
        self.entries.iter().map(|(c, k, v)| (*c, k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
