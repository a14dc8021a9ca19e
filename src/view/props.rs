//! Host property maps
//!
//! Hosts deliver property changes as a JSON object keyed by prop name. Keys
//! are applied in a fixed order: plain properties first, then `source`, then
//! `seek` and `fullscreen`, so a batch that sets both a volume and a source
//! opens the source with that volume already configured.

use log::warn;
use serde_json::{Map, Value};

use super::PlayerView;
use crate::engine::ResizeMode;
use crate::utils::error::{BridgeError, Result};

/// Applied after every other key, in this order
const DEFERRED: [&str; 3] = ["source", "seek", "fullscreen"];

impl PlayerView {
    /// Apply a host property map
    ///
    /// Well-typed keys are applied even when others are rejected; the error
    /// lists every rejected key. Unknown keys are ignored.
    pub fn set_props(&mut self, props: &Map<String, Value>) -> Result<()> {
        let mut rejected = Vec::new();

        let immediate = props
            .iter()
            .map(|(key, value)| (key.as_str(), value))
            .filter(|(key, _)| !DEFERRED.contains(key));
        let deferred = DEFERRED
            .iter()
            .filter_map(|key| props.get(*key).map(|value| (*key, value)));

        for (key, value) in immediate.chain(deferred) {
            if let Err(err) = self.set_prop(key, value) {
                warn!("rejected property {}: {}", key, err);
                rejected.push(err.to_string());
            }
        }

        if rejected.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::rejected(rejected.join("; ")))
        }
    }

    fn set_prop(&mut self, key: &str, value: &Value) -> Result<()> {
        match key {
            "source" => {
                let uri = source_uri(value)?;
                self.set_source(&uri);
            }
            "paused" => self.set_paused(as_bool(key, value)?),
            "muted" => self.set_muted(as_bool(key, value)?),
            "volume" => self.set_volume(as_f64(key, value)? as f32),
            "rate" => self.set_rate(as_f64(key, value)? as f32),
            "seek" => self.set_seek(as_f64(key, value)?),
            "resizeMode" => {
                let name = value
                    .as_str()
                    .ok_or_else(|| type_error(key, "a string", value))?;
                let mode = ResizeMode::from_host(name)
                    .ok_or_else(|| BridgeError::rejected(format!("unknown resizeMode {:?}", name)))?;
                self.set_resize_mode(mode);
            }
            "maxBufferSize" => self.set_max_buffer_size(as_optional_size(key, value)?),
            "minBufferSize" => self.set_min_buffer_size(as_optional_size(key, value)?),
            "enableHardwareDecoding" => self.set_hardware_decoding_enabled(as_bool(key, value)?),
            "lowLatencyMode" => self.set_low_latency_mode(as_bool(key, value)?),
            "fullscreen" => self.set_fullscreen(as_bool(key, value)?),
            other => warn!("ignoring unknown property {}", other),
        }
        Ok(())
    }
}

/// `source` is either a URI string or an object with a `uri` field
fn source_uri(value: &Value) -> Result<String> {
    match value {
        Value::String(uri) => Ok(uri.clone()),
        Value::Object(fields) => fields
            .get("uri")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BridgeError::rejected("source object has no string uri")),
        Value::Null => Ok(String::new()),
        other => Err(type_error("source", "a string or {uri}", other)),
    }
}

fn as_bool(key: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| type_error(key, "a boolean", value))
}

fn as_f64(key: &str, value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| type_error(key, "a number", value))
}

fn as_optional_size(key: &str, value: &Value) -> Result<Option<u64>> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_u64()
        .map(Some)
        .ok_or_else(|| type_error(key, "a non-negative integer", value))
}

fn type_error(key: &str, expected: &str, value: &Value) -> BridgeError {
    BridgeError::rejected(format!("{} must be {}, got {}", key, expected, value))
}
