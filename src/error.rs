//! Failure classes for the live session engine.
//!
//! Device and channel errors are fatal to a connect attempt, decode errors cost
//! one inbound chunk, and release errors are logged during teardown and then
//! ignored. `SessionError` is what a caller finally sees.

use crate::session::SessionState;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("permission denied for {device}. {hint}")]
    PermissionDenied { device: String, hint: String },

    #[error("{device} unavailable: {reason}")]
    Unavailable { device: String, reason: String },

    #[error("{device} uses unsupported sample format {format}")]
    UnsupportedFormat { device: String, format: String },

    #[error("failed to start {device}: {reason}")]
    StartFailed { device: String, reason: String },

    #[error("{device} did not start within {timeout_ms} ms")]
    Timeout { device: String, timeout_ms: u64 },
}

impl DeviceError {
    /// Map a backend error message onto a device failure. Backends report
    /// denied access as free text, so look for the usual wording.
    pub fn from_backend(device: &str, reason: impl ToString, hint: &str) -> Self {
        let reason = reason.to_string();
        let lowered = reason.to_ascii_lowercase();
        if ["permission", "denied", "not authorized", "not permitted"]
            .iter()
            .any(|needle| lowered.contains(needle))
        {
            DeviceError::PermissionDenied {
                device: device.to_string(),
                hint: hint.to_string(),
            }
        } else {
            DeviceError::StartFailed {
                device: device.to_string(),
                reason,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("no API key configured (set GEMINI_API_KEY or pass --api-key)")]
    MissingApiKey,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection not established within {0} ms")]
    Timeout(u64),

    #[error("channel already closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty audio payload")]
    Empty,

    #[error("audio payload has odd length {0}; expected 16-bit samples")]
    OddLength(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceReleaseError {
    #[error("{0} already released")]
    AlreadyReleased(&'static str),

    #[error("failed to release {resource}: {reason}")]
    Failed {
        resource: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("remote session error: {0}")]
    Remote(String),
}

impl SessionError {
    /// Whether starting a new session could succeed without user action.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SessionError::Device(DeviceError::PermissionDenied { .. }) => false,
            SessionError::Channel(ChannelError::MissingApiKey)
            | SessionError::Channel(ChannelError::InvalidEndpoint(_)) => false,
            _ => true,
        }
    }
}
