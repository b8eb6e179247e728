//! JSON-lines protocol between the engine and an external UI shell.
//!
//! Messages are newline-delimited JSON objects: events carry an `"event"` tag,
//! commands a `"cmd"` tag.

use crate::session::{ConnectionStatus, SessionStats};
use serde::{Deserialize, Serialize};

// ============================================================================
// IPC Events (Rust → client)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum IpcEvent {
    /// Sent once on startup and again on `get_capabilities`
    #[serde(rename = "capabilities")]
    Capabilities {
        session_id: String,
        version: String,
        mic_available: bool,
        input_devices: Vec<String>,
        input_device: Option<String>,
        output_device: Option<String>,
        video_source: String,
        model: String,
        voice: String,
        api_key_configured: bool,
        input_sample_rate: u32,
        output_sample_rate: u32,
        frequency_bins: usize,
    },

    /// Connection status changed or was requested
    #[serde(rename = "status")]
    Status {
        status: ConnectionStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        mic_enabled: bool,
        camera_enabled: bool,
    },

    /// Result of a mic or camera switch
    #[serde(rename = "devices")]
    Devices {
        mic_enabled: bool,
        camera_enabled: bool,
        /// False when no live session picked up the change; it still applies to the next one.
        applied: bool,
    },

    /// Output spectrum for the visualizer
    #[serde(rename = "spectrum")]
    Spectrum {
        bins: Vec<u8>,
        average: f32,
        pulse: f32,
        bars: Vec<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mic_level_db: Option<f32>,
    },

    #[serde(rename = "stats")]
    Stats {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(flatten)]
        stats: SessionStats,
    },

    /// Error (recoverable or fatal)
    #[serde(rename = "error")]
    Error { message: String, recoverable: bool },
}

// ============================================================================
// IPC Commands (client → Rust)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd")]
pub enum IpcCommand {
    /// Start a new live session
    #[serde(rename = "connect")]
    Connect,

    /// End the current session
    #[serde(rename = "disconnect")]
    Disconnect,

    #[serde(rename = "set_mic")]
    SetMic { enabled: bool },

    #[serde(rename = "set_camera")]
    SetCamera { enabled: bool },

    #[serde(rename = "get_status")]
    GetStatus,

    /// Request spectrum data; `bars` defaults to the 48-bar ring
    #[serde(rename = "get_spectrum")]
    GetSpectrum {
        #[serde(default)]
        bars: Option<usize>,
    },

    #[serde(rename = "get_stats")]
    GetStats,

    /// Request capabilities (re-emit capabilities event)
    #[serde(rename = "get_capabilities")]
    GetCapabilities,
}
