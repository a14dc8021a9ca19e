//! Host event surface of the view adapter
//!
//! Every notification the view sends outward is a [`VideoEvent`]. The host
//! registers one handler per [`EventKind`] on the [`EventSink`]; an event
//! whose slot is empty is dropped silently, like an unbound prop.

use std::collections::HashMap;
use std::fmt;

use log::{debug, trace};
use serde::Serialize;
use serde_json::{json, Value};

use crate::dispatch::guarded;
use crate::utils::error::{BridgeError, ErrorKind, Result};

/// Event slot names known to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    LoadStart,
    Load,
    Buffer,
    Error,
    Progress,
    Seek,
    End,
    FullscreenPlayerWillPresent,
    FullscreenPlayerDidPresent,
    FullscreenPlayerWillDismiss,
    FullscreenPlayerDidDismiss,
    ReadyForDisplay,
    PlaybackStalled,
    PlaybackResume,
    PlaybackRateChange,
    Tap,
}

impl EventKind {
    pub const ALL: [EventKind; 16] = [
        EventKind::LoadStart,
        EventKind::Load,
        EventKind::Buffer,
        EventKind::Error,
        EventKind::Progress,
        EventKind::Seek,
        EventKind::End,
        EventKind::FullscreenPlayerWillPresent,
        EventKind::FullscreenPlayerDidPresent,
        EventKind::FullscreenPlayerWillDismiss,
        EventKind::FullscreenPlayerDidDismiss,
        EventKind::ReadyForDisplay,
        EventKind::PlaybackStalled,
        EventKind::PlaybackResume,
        EventKind::PlaybackRateChange,
        EventKind::Tap,
    ];

    /// Name of the host prop the event is delivered through
    pub fn host_name(self) -> &'static str {
        match self {
            EventKind::LoadStart => "onVideoLoadStart",
            EventKind::Load => "onVideoLoad",
            EventKind::Buffer => "onVideoBuffer",
            EventKind::Error => "onVideoError",
            EventKind::Progress => "onVideoProgress",
            EventKind::Seek => "onVideoSeek",
            EventKind::End => "onVideoEnd",
            EventKind::FullscreenPlayerWillPresent => "onVideoFullscreenPlayerWillPresent",
            EventKind::FullscreenPlayerDidPresent => "onVideoFullscreenPlayerDidPresent",
            EventKind::FullscreenPlayerWillDismiss => "onVideoFullscreenPlayerWillDismiss",
            EventKind::FullscreenPlayerDidDismiss => "onVideoFullscreenPlayerDidDismiss",
            EventKind::ReadyForDisplay => "onReadyForDisplay",
            EventKind::PlaybackStalled => "onPlaybackStalled",
            EventKind::PlaybackResume => "onPlaybackResume",
            EventKind::PlaybackRateChange => "onPlaybackRateChange",
            EventKind::Tap => "onTap",
        }
    }

    pub fn from_host_name(name: &str) -> Option<Self> {
        EventKind::ALL.iter().copied().find(|kind| kind.host_name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host_name())
    }
}

/// Video dimensions as reported in `onVideoLoad`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NaturalSize {
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl NaturalSize {
    pub fn new(width: u32, height: u32) -> Self {
        let orientation = if width >= height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        };
        Self { width, height, orientation }
    }
}

/// Error body carried by `onVideoError`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub code: i32,
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&BridgeError> for ErrorPayload {
    fn from(err: &BridgeError) -> Self {
        Self {
            code: err.code(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// A notification for the host
///
/// Times are in seconds, as the host expects them.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoEvent {
    LoadStart {
        uri: String,
        is_network: bool,
    },

    Load {
        /// `0.0` for live sources
        duration: f64,
        current_time: f64,
        natural_size: Option<NaturalSize>,
        is_live: bool,
    },

    Buffer {
        is_buffering: bool,
    },

    Error(ErrorPayload),

    Progress {
        current_time: f64,
        playable_duration: f64,
        seekable_duration: f64,
    },

    Seek {
        current_time: f64,
        seek_time: f64,
    },

    End,
    FullscreenPlayerWillPresent,
    FullscreenPlayerDidPresent,
    FullscreenPlayerWillDismiss,
    FullscreenPlayerDidDismiss,
    ReadyForDisplay,
    PlaybackStalled,

    PlaybackResume {
        playback_rate: f32,
    },

    PlaybackRateChange {
        playback_rate: f32,
    },

    Tap,
}

impl VideoEvent {
    pub fn error(err: &BridgeError) -> Self {
        VideoEvent::Error(ErrorPayload::from(err))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            VideoEvent::LoadStart { .. } => EventKind::LoadStart,
            VideoEvent::Load { .. } => EventKind::Load,
            VideoEvent::Buffer { .. } => EventKind::Buffer,
            VideoEvent::Error(_) => EventKind::Error,
            VideoEvent::Progress { .. } => EventKind::Progress,
            VideoEvent::Seek { .. } => EventKind::Seek,
            VideoEvent::End => EventKind::End,
            VideoEvent::FullscreenPlayerWillPresent => EventKind::FullscreenPlayerWillPresent,
            VideoEvent::FullscreenPlayerDidPresent => EventKind::FullscreenPlayerDidPresent,
            VideoEvent::FullscreenPlayerWillDismiss => EventKind::FullscreenPlayerWillDismiss,
            VideoEvent::FullscreenPlayerDidDismiss => EventKind::FullscreenPlayerDidDismiss,
            VideoEvent::ReadyForDisplay => EventKind::ReadyForDisplay,
            VideoEvent::PlaybackStalled => EventKind::PlaybackStalled,
            VideoEvent::PlaybackResume { .. } => EventKind::PlaybackResume,
            VideoEvent::PlaybackRateChange { .. } => EventKind::PlaybackRateChange,
            VideoEvent::Tap => EventKind::Tap,
        }
    }

    /// JSON body handed to the host handler
    pub fn body(&self) -> Value {
        match self {
            VideoEvent::LoadStart { uri, is_network } => json!({
                "src": { "uri": uri, "isNetwork": is_network },
            }),
            VideoEvent::Load {
                duration,
                current_time,
                natural_size,
                is_live,
            } => json!({
                "duration": duration,
                "currentTime": current_time,
                "naturalSize": natural_size,
                "isLive": is_live,
            }),
            VideoEvent::Buffer { is_buffering } => json!({ "isBuffering": is_buffering }),
            VideoEvent::Error(payload) => json!({ "error": payload }),
            VideoEvent::Progress {
                current_time,
                playable_duration,
                seekable_duration,
            } => json!({
                "currentTime": current_time,
                "playableDuration": playable_duration,
                "seekableDuration": seekable_duration,
            }),
            VideoEvent::Seek { current_time, seek_time } => json!({
                "currentTime": current_time,
                "seekTime": seek_time,
            }),
            VideoEvent::PlaybackResume { playback_rate } | VideoEvent::PlaybackRateChange { playback_rate } => {
                json!({ "playbackRate": playback_rate })
            }
            VideoEvent::End
            | VideoEvent::FullscreenPlayerWillPresent
            | VideoEvent::FullscreenPlayerDidPresent
            | VideoEvent::FullscreenPlayerWillDismiss
            | VideoEvent::FullscreenPlayerDidDismiss
            | VideoEvent::ReadyForDisplay
            | VideoEvent::PlaybackStalled
            | VideoEvent::Tap => json!({}),
        }
    }
}

type Handler = Box<dyn FnMut(&VideoEvent) + Send>;

/// Named handler slots, one per event kind
#[derive(Default)]
pub struct EventSink {
    slots: HashMap<EventKind, Handler>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `kind`, replacing any previous one
    pub fn set<F>(&mut self, kind: EventKind, handler: F)
    where
        F: FnMut(&VideoEvent) + Send + 'static,
    {
        debug!("binding handler for {}", kind);
        self.slots.insert(kind, Box::new(handler));
    }

    pub fn clear(&mut self, kind: EventKind) {
        self.slots.remove(&kind);
    }

    pub fn is_set(&self, kind: EventKind) -> bool {
        self.slots.contains_key(&kind)
    }

    /// Invoke the handler bound to the event's kind
    ///
    /// Returns `Ok(false)` when no handler is bound. A panicking handler is
    /// reported as an `Internal` error and stays bound.
    pub fn dispatch(&mut self, event: &VideoEvent) -> Result<bool> {
        let kind = event.kind();
        let Some(handler) = self.slots.get_mut(&kind) else {
            trace!("no handler for {}", kind);
            return Ok(false);
        };
        guarded(kind.host_name(), || handler(event))?;
        Ok(true)
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bound: Vec<&str> = self.slots.keys().map(|k| k.host_name()).collect();
        bound.sort_unstable();
        f.debug_struct("EventSink").field("bound", &bound).finish()
    }
}
