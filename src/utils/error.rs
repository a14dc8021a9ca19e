//! Error types for playerbridge
//!
//! This module defines the error taxonomy surfaced to the host. We use
//! thiserror for the library error type; the demo binary wraps it in anyhow.

use serde::Serialize;
use thiserror::Error;

/// Main error type for playerbridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The engine could not open the source (bad or unreachable URI)
    #[error("Source open failure: {0}")]
    SourceOpen(String),

    /// A property value was refused, either by the bridge or by the engine
    #[error("Configuration rejected: {0}")]
    ConfigurationRejected(String),

    /// Mid-stream failure reported by the engine
    #[error("Playback failure (code {code}): {message}")]
    Playback { code: i32, message: String },

    /// An in-flight operation was invalidated by a later call
    #[error("Operation superseded: {0}")]
    Superseded(String),

    /// Call not valid in the current lifecycle state
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState { operation: &'static str, state: String },

    /// The owner was shut down
    #[error("Player has been shut down")]
    Disposed,

    /// Configuration file or environment errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// Generic error for unexpected situations
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable error classification reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    SourceOpenFailure,
    EngineConfigurationRejected,
    PlaybackFailure,
    OperationSuperseded,
    InvalidState,
    Disposed,
    Config,
    Internal,
}

impl ErrorKind {
    /// Numeric code carried in host error payloads
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::SourceOpenFailure => 1001,
            ErrorKind::EngineConfigurationRejected => 1002,
            ErrorKind::PlaybackFailure => 1003,
            ErrorKind::OperationSuperseded => 1004,
            ErrorKind::InvalidState => 1005,
            ErrorKind::Disposed => 1006,
            ErrorKind::Config => 1007,
            ErrorKind::Internal => 1099,
        }
    }
}

impl BridgeError {
    /// Create a source open error from string
    pub fn source_open<S: Into<String>>(msg: S) -> Self {
        BridgeError::SourceOpen(msg.into())
    }

    /// Create a configuration rejected error from string
    pub fn rejected<S: Into<String>>(msg: S) -> Self {
        BridgeError::ConfigurationRejected(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::SourceOpen(_) => ErrorKind::SourceOpenFailure,
            BridgeError::ConfigurationRejected(_) => ErrorKind::EngineConfigurationRejected,
            BridgeError::Playback { .. } => ErrorKind::PlaybackFailure,
            BridgeError::Superseded(_) => ErrorKind::OperationSuperseded,
            BridgeError::InvalidState { .. } => ErrorKind::InvalidState,
            BridgeError::Disposed => ErrorKind::Disposed,
            BridgeError::Config(_) | BridgeError::FileIO(_) => ErrorKind::Config,
            BridgeError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Engine-specific code when the engine supplied one, otherwise the kind code
    pub fn code(&self) -> i32 {
        match self {
            BridgeError::Playback { code, .. } => *code,
            other => other.kind().code(),
        }
    }
}

/// Convenience type alias for Results in playerbridge
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Extension trait for converting other errors to BridgeError
pub trait IntoBridgeError<T> {
    /// Convert this error into a BridgeError with the given context
    fn config_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoBridgeError<T> for std::result::Result<T, E> {
    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| BridgeError::Config(format!("{}: {}", context, e)))
    }
}

/// Helper macro for creating internal errors with file and line information
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::utils::error::BridgeError::Internal(
            format!("{} at {}:{}", $msg, file!(), line!())
        )
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::utils::error::BridgeError::Internal(
            format!("{} at {}:{}", format!($fmt, $($arg)*), file!(), line!())
        )
    };
}
