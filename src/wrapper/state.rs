//! Facade lifecycle states

use std::fmt;

use crate::utils::error::{BridgeError, Result};

/// Lifecycle of a [`PlayerWrapper`](super::PlayerWrapper)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperState {
    /// Created, no source set up yet
    Idle,

    /// Handle created, waiting for the engine to become ready
    Preparing,

    /// Prepared and not started
    Ready,

    Playing,

    Paused,

    /// Stopped by request or at the end of the media; no handle held
    Stopped,

    /// Open or playback failure; no handle held
    Failed,

    /// Shut down; every call is refused
    Disposed,
}

impl WrapperState {
    pub fn name(self) -> &'static str {
        match self {
            WrapperState::Idle => "idle",
            WrapperState::Preparing => "preparing",
            WrapperState::Ready => "ready",
            WrapperState::Playing => "playing",
            WrapperState::Paused => "paused",
            WrapperState::Stopped => "stopped",
            WrapperState::Failed => "failed",
            WrapperState::Disposed => "disposed",
        }
    }

    pub fn can_setup(self) -> bool {
        matches!(
            self,
            WrapperState::Idle
                | WrapperState::Ready
                | WrapperState::Paused
                | WrapperState::Stopped
                | WrapperState::Failed
        )
    }

    pub fn can_play(self) -> bool {
        matches!(self, WrapperState::Ready | WrapperState::Paused | WrapperState::Stopped)
    }

    pub fn can_pause(self) -> bool {
        self == WrapperState::Playing
    }

    pub fn can_stop(self) -> bool {
        matches!(self, WrapperState::Playing | WrapperState::Paused | WrapperState::Ready)
    }

    /// States in which an engine handle is held
    pub fn holds_engine(self) -> bool {
        matches!(
            self,
            WrapperState::Preparing | WrapperState::Ready | WrapperState::Playing | WrapperState::Paused
        )
    }

    /// Refuse `operation` unless `allowed` holds for this state
    pub fn require(self, operation: &'static str, allowed: fn(WrapperState) -> bool) -> Result<()> {
        if self == WrapperState::Disposed {
            return Err(BridgeError::Disposed);
        }
        if allowed(self) {
            Ok(())
        } else {
            Err(BridgeError::InvalidState {
                operation,
                state: self.name().to_string(),
            })
        }
    }
}

impl fmt::Display for WrapperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
