//! Owner of the "current session" slot.
//!
//! Every connect builds a brand-new [`Session`]; a finished one is kept only so
//! its stats stay readable. Front ends poll [`LiveController::drain_notices`]
//! for status changes and failures.

use super::lifecycle::{Session, SessionStats};
use super::state::{ConnectionStatus, SessionState};
use crate::audio::{ring_levels, RingLevels, SpectrumAnalyser};
use crate::channel::Connector;
use crate::config::{ChannelConfig, MediaRequest, SessionSettings};
use crate::error::SessionError;
use crate::log_debug;
use crate::media::MediaDevices;
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Status {
        status: ConnectionStatus,
        session_id: Option<String>,
    },
    Error {
        message: String,
        recoverable: bool,
    },
}

pub struct LiveController {
    devices: Box<dyn MediaDevices>,
    connector: Box<dyn Connector>,
    settings: SessionSettings,
    media: MediaRequest,
    channel_config: ChannelConfig,
    session: Option<Session>,
    status: ConnectionStatus,
    notices: VecDeque<SessionNotice>,
    analyser: SpectrumAnalyser,
}

impl LiveController {
    pub fn new(
        devices: Box<dyn MediaDevices>,
        connector: Box<dyn Connector>,
        settings: SessionSettings,
        media: MediaRequest,
        channel_config: ChannelConfig,
    ) -> Self {
        let analyser = SpectrumAnalyser::new(settings.fft_size, settings.spectrum_smoothing);
        Self {
            devices,
            connector,
            settings,
            media,
            channel_config,
            session: None,
            status: ConnectionStatus::Offline,
            notices: VecDeque::new(),
            analyser,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn state(&self) -> Option<SessionState> {
        self.session.as_ref().map(Session::state)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(Session::id)
    }

    pub fn stats(&self) -> Option<SessionStats> {
        self.session.as_ref().map(Session::stats)
    }

    pub fn mic_enabled(&self) -> bool {
        self.settings.mic_enabled
    }

    pub fn camera_enabled(&self) -> bool {
        self.settings.camera_enabled
    }

    pub fn mic_level_db(&self) -> Option<f32> {
        self.session
            .as_ref()
            .filter(|session| session.state() == SessionState::Active)
            .map(|session| session.meter().level_db())
    }

    pub fn live_tracks(&self) -> usize {
        self.session.as_ref().map_or(0, Session::live_tracks)
    }

    pub fn connect(&mut self) -> Result<(), SessionError> {
        if let Some(state) = self.state().filter(|state| state.is_busy()) {
            return Err(SessionError::InvalidState {
                operation: "connect",
                state,
            });
        }
        // Drop the finished session before acquiring devices for the next one.
        self.session = None;
        let mut session = Session::new(
            self.settings.clone(),
            self.media.clone(),
            self.channel_config.clone(),
        );
        self.status = ConnectionStatus::Connecting;
        self.notices.push_back(SessionNotice::Status {
            status: ConnectionStatus::Connecting,
            session_id: Some(session.id().to_string()),
        });
        let result = session.connect(self.devices.as_mut(), self.connector.as_ref());
        self.session = Some(session);
        self.sync();
        result
    }

    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.disconnect();
        }
        self.sync();
    }

    pub fn pump(&mut self, now: Instant) {
        if let Some(session) = self.session.as_mut() {
            session.pump(now);
        }
        self.sync();
    }

    /// Record the preference and apply it to the live session if there is one.
    pub fn set_mic_enabled(&mut self, enabled: bool) -> bool {
        self.settings.mic_enabled = enabled;
        self.session
            .as_mut()
            .is_some_and(|session| session.set_mic_enabled(enabled))
    }

    pub fn set_camera_enabled(&mut self, enabled: bool) -> bool {
        self.settings.camera_enabled = enabled;
        self.session
            .as_mut()
            .is_some_and(|session| session.set_camera_enabled(enabled))
    }

    pub fn drain_notices(&mut self) -> Vec<SessionNotice> {
        self.notices.drain(..).collect()
    }

    /// Byte frequency data of what is currently playing; zeros when idle.
    pub fn spectrum(&mut self) -> Vec<u8> {
        match self.session.as_ref() {
            Some(session) if session.state() == SessionState::Active => {
                let tap = session.frequency_tap();
                self.analyser.byte_frequency_data(&tap)
            }
            _ => vec![0; self.analyser.frequency_bin_count()],
        }
    }

    pub fn ring(&mut self, bars: usize) -> RingLevels {
        let bins = self.spectrum();
        ring_levels(&bins, bars)
    }

    fn sync(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(err) = session.take_failure() {
            log_debug(&format!("session {} reported failure: {err}", session.id()));
            self.notices.push_back(SessionNotice::Error {
                message: err.to_string(),
                recoverable: err.is_recoverable(),
            });
        }
        let status = session.state().connection_status();
        if status != self.status {
            self.status = status;
            self.notices.push_back(SessionNotice::Status {
                status,
                session_id: Some(session.id().to_string()),
            });
        }
    }
}
