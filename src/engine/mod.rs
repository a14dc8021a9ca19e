//! Engine module for playerbridge
//!
//! The player engine itself (demuxing, decoding, networking, rendering) lives
//! in an external framework. This module defines the interface the bridge
//! consumes from it, the option sets handed to it at creation time, and an
//! in-process simulated engine used by the demo binary and the tests.

pub mod options;
pub mod simulated;

#[cfg(any(test, feature = "test-util"))]
pub mod recording;

pub use options::{EngineOptions, OptionCategory, OptionValue};
pub use simulated::{SimulatedEngine, SimulatedEngineFactory, SimulationScript};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::time::Duration;

use crate::dispatch::EngineNotifier;
use crate::utils::error::Result;

/// Player engine handle
///
/// One handle plays one source. All methods are called from the owning
/// thread and must return without blocking; completion is reported through
/// the [`EngineNotifier`] the handle was created with.
#[cfg_attr(test, mockall::automock)]
pub trait PlayerEngine: Send {
    /// Begin opening the source; `Prepared` or `Failed` follows
    fn prepare_to_play(&mut self) -> Result<()>;

    /// Start or resume playback
    ///
    /// Before the handle is prepared this arms auto-start instead.
    fn play(&mut self) -> Result<()>;

    /// Pause playback
    fn pause(&mut self) -> Result<()>;

    /// Stop playback and release decode resources
    fn stop(&mut self) -> Result<()>;

    /// Release the handle; no callbacks are sent afterwards
    fn shutdown(&mut self);

    fn is_playing(&self) -> bool;

    /// Current playback position
    fn current_playback_time(&self) -> Duration;

    /// Media duration, `None` for live or unknown-length sources
    fn duration(&self) -> Option<Duration>;

    /// How far the engine has buffered
    fn playable_duration(&self) -> Duration;

    /// Seek to a position; `SeekCompleted` follows
    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Output volume (0.0 to 1.0)
    fn set_volume(&mut self, volume: f32) -> Result<()>;

    fn set_muted(&mut self, muted: bool) -> Result<()>;

    /// Playback rate multiplier (1.0 = normal)
    fn set_playback_rate(&mut self, rate: f32) -> Result<()>;

    fn set_resize_mode(&mut self, mode: ResizeMode) -> Result<()>;

    fn set_buffer_limits(&mut self, limits: BufferLimits) -> Result<()>;

    fn set_hardware_decoding(&mut self, enabled: bool) -> Result<()>;

    /// Apply runtime-settable options to an existing handle
    fn apply_options(&mut self, options: &EngineOptions) -> Result<()>;
}

/// Creates engine handles
#[cfg_attr(test, mockall::automock)]
pub trait EngineFactory: Send + Sync {
    /// Create a handle for `uri`
    ///
    /// Returns `SourceOpen` when the engine refuses the source outright.
    fn create(
        &self,
        uri: &str,
        options: &EngineOptions,
        notifier: EngineNotifier,
    ) -> Result<Box<dyn PlayerEngine>>;
}

/// How video is fitted into the view bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Natural size, no scaling
    None,

    /// Scale to fit, letterboxed
    #[default]
    Contain,

    /// Scale to fill, cropped
    Cover,

    /// Fill ignoring aspect ratio
    Stretch,
}

impl ResizeMode {
    /// Parse a host resize mode name
    pub fn from_host(name: &str) -> Option<Self> {
        match name {
            "none" => Some(ResizeMode::None),
            "contain" => Some(ResizeMode::Contain),
            "cover" => Some(ResizeMode::Cover),
            "stretch" => Some(ResizeMode::Stretch),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResizeMode::None => "none",
            ResizeMode::Contain => "contain",
            ResizeMode::Cover => "cover",
            ResizeMode::Stretch => "stretch",
        }
    }
}

/// Buffer thresholds in engine-defined units; `None` keeps the engine default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferLimits {
    pub max_buffer_size: Option<u64>,
    pub min_buffer_size: Option<u64>,
}

/// Engine load state bit set
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LoadState(u32);

impl LoadState {
    pub const UNKNOWN: LoadState = LoadState(0);
    pub const PLAYABLE: LoadState = LoadState(1 << 0);
    pub const PLAYTHROUGH_OK: LoadState = LoadState(1 << 1);
    pub const STALLED: LoadState = LoadState(1 << 2);

    pub fn from_bits(bits: u32) -> Self {
        LoadState(bits & 0b111)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: LoadState) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_stalled(self) -> bool {
        self.contains(LoadState::STALLED)
    }

    pub fn is_playable(self) -> bool {
        self.0 & (LoadState::PLAYABLE.0 | LoadState::PLAYTHROUGH_OK.0) != 0
    }
}

impl BitOr for LoadState {
    type Output = LoadState;

    fn bitor(self, rhs: LoadState) -> LoadState {
        LoadState(self.0 | rhs.0)
    }
}

impl fmt::Debug for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "LoadState(UNKNOWN)");
        }
        let names: Vec<&str> = [
            (LoadState::PLAYABLE, "PLAYABLE"),
            (LoadState::PLAYTHROUGH_OK, "PLAYTHROUGH_OK"),
            (LoadState::STALLED, "STALLED"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
        write!(f, "LoadState({})", names.join(" | "))
    }
}

/// Engine-side playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePlaybackState {
    Stopped,
    Playing,
    Paused,
    Interrupted,
    SeekingForward,
    SeekingBackward,
}

/// Why playback finished without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The end of the media was reached
    PlaybackEnded,

    /// Playback was ended by a stop request
    UserExited,
}

/// Notification sent by an engine handle
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The source is open and playable
    Prepared {
        duration: Option<Duration>,
        natural_size: Option<(u32, u32)>,
    },

    /// Buffering/load state transition
    LoadStateChanged(LoadState),

    /// Engine playback state transition
    PlaybackStateChanged(EnginePlaybackState),

    /// The first video frame was put on screen
    FirstVideoFrameRendered,

    /// A seek finished at `position`
    SeekCompleted { position: Duration },

    /// The effective playback rate changed (0.0 while paused)
    RateChanged { rate: f32 },

    /// Playback finished without an error
    Finished(FinishReason),

    /// Open or playback failure
    Failed { code: i32, message: String },
}
