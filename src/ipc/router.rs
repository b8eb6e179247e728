use crate::error::SessionError;
use crate::log_debug;
use crate::session::SessionNotice;

use super::protocol::IpcEvent;
use super::session::{send_event, IpcState};

pub(super) const DEFAULT_RING_BARS: usize = 48;
const MAX_RING_BARS: usize = 512;

// ============================================================================
// Command Handlers
// ============================================================================

pub(super) fn handle_connect(state: &mut IpcState) {
    match state.controller.connect() {
        Ok(()) => log_debug("IPC connect: session connecting"),
        Err(err @ SessionError::InvalidState { .. }) => {
            send_event(&IpcEvent::Error {
                message: err.to_string(),
                recoverable: true,
            });
        }
        // Device and channel failures arrive through the controller's notices.
        Err(err) => log_debug(&format!("IPC connect failed: {err}")),
    }
    forward_notices(state);
}

pub(super) fn handle_disconnect(state: &mut IpcState) {
    state.controller.disconnect();
    forward_notices(state);
}

pub(super) fn handle_set_mic(state: &mut IpcState, enabled: bool) {
    let applied = state.controller.set_mic_enabled(enabled);
    emit_devices(state, applied);
}

pub(super) fn handle_set_camera(state: &mut IpcState, enabled: bool) {
    let applied = state.controller.set_camera_enabled(enabled);
    emit_devices(state, applied);
}

pub(super) fn handle_get_spectrum(state: &mut IpcState, bars: Option<usize>) {
    let bars = bars.unwrap_or(DEFAULT_RING_BARS).clamp(1, MAX_RING_BARS);
    let bins = state.controller.spectrum();
    let ring = crate::audio::ring_levels(&bins, bars);
    send_event(&IpcEvent::Spectrum {
        bins,
        average: ring.average,
        pulse: ring.pulse,
        bars: ring.bars,
        mic_level_db: state.controller.mic_level_db(),
    });
}

pub(super) fn handle_get_stats(state: &IpcState) {
    send_event(&IpcEvent::Stats {
        session_id: state.controller.session_id().map(str::to_string),
        stats: state.controller.stats().unwrap_or_default(),
    });
}

pub(super) fn emit_status(state: &IpcState) {
    send_event(&IpcEvent::Status {
        status: state.controller.status(),
        session_id: state.controller.session_id().map(str::to_string),
        mic_enabled: state.controller.mic_enabled(),
        camera_enabled: state.controller.camera_enabled(),
    });
}

fn emit_devices(state: &IpcState, applied: bool) {
    send_event(&IpcEvent::Devices {
        mic_enabled: state.controller.mic_enabled(),
        camera_enabled: state.controller.camera_enabled(),
        applied,
    });
}

/// Turn controller notices into events, in the order they were raised.
pub(super) fn forward_notices(state: &mut IpcState) {
    for notice in state.controller.drain_notices() {
        match notice {
            SessionNotice::Status { status, session_id } => send_event(&IpcEvent::Status {
                status,
                session_id,
                mic_enabled: state.controller.mic_enabled(),
                camera_enabled: state.controller.camera_enabled(),
            }),
            SessionNotice::Error {
                message,
                recoverable,
            } => send_event(&IpcEvent::Error {
                message,
                recoverable,
            }),
        }
    }
}
