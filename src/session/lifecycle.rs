//! One live conversation from connect to teardown.
//!
//! A `Session` exclusively owns everything it acquires: the capture stream,
//! the input and output contexts, the channel, the capture node and the video
//! timer. It is driven by [`Session::pump`] from a single loop and never
//! restarts: once Closed or Failed it only reports what happened.

use super::state::SessionState;
use crate::audio::{
    AudioOutput, CaptureNode, FrequencyTap, InputContext, LiveMeter, PlaybackScheduler,
};
use crate::channel::{Channel, Connector, InboundEvent};
use crate::config::{ChannelConfig, MediaRequest, SessionSettings};
use crate::error::{ResourceReleaseError, SessionError};
use crate::media::{CaptureStream, MediaDevices};
use crate::telemetry::{record_playback, record_teardown_step, record_transition};
use crate::video::VideoSampler;
use crate::{log_debug, log_timing, set_log_session};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static SESSION_SEQ: AtomicU32 = AtomicU32::new(0);

fn next_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0);
    let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{millis:x}-{seq}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub audio_chunks_sent: u64,
    pub video_chunks_sent: u64,
    pub video_ticks: u64,
    pub audio_chunks_scheduled: u64,
    pub decode_errors: u64,
    pub dropped_capture_frames: u64,
    /// Inbound audio that arrived before the session went Active.
    pub dropped_inbound: u64,
}

/// Outcome of one release step during the most recent teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownStep {
    pub name: &'static str,
    pub error: Option<String>,
}

pub struct Session {
    pub(super) id: String,
    pub(super) state: SessionState,
    pub(super) settings: SessionSettings,
    media: MediaRequest,
    channel_config: ChannelConfig,
    scheduler: PlaybackScheduler,
    tap: FrequencyTap,
    pub(super) meter: LiveMeter,
    pub(super) stream: Option<CaptureStream>,
    input: Option<InputContext>,
    output: Option<Box<dyn AudioOutput>>,
    channel: Option<Box<dyn Channel>>,
    capture: Option<CaptureNode>,
    video: Option<VideoSampler>,
    pub(super) stats: SessionStats,
    failure: Option<SessionError>,
    teardown_steps: Vec<TeardownStep>,
}

impl Session {
    pub fn new(settings: SessionSettings, media: MediaRequest, channel_config: ChannelConfig) -> Self {
        let tap = FrequencyTap::new(settings.fft_size);
        Self {
            id: next_session_id(),
            state: SessionState::Idle,
            scheduler: PlaybackScheduler::new(settings.output_sample_rate),
            tap,
            meter: LiveMeter::new(),
            settings,
            media,
            channel_config,
            stream: None,
            input: None,
            output: None,
            channel: None,
            capture: None,
            video: None,
            stats: SessionStats::default(),
            failure: None,
            teardown_steps: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn is_mic_enabled(&self) -> bool {
        self.settings.mic_enabled
    }

    pub fn is_camera_enabled(&self) -> bool {
        self.settings.camera_enabled
    }

    pub fn frequency_tap(&self) -> FrequencyTap {
        self.tap.clone()
    }

    pub fn meter(&self) -> LiveMeter {
        self.meter.clone()
    }

    pub fn playback_cursor(&self) -> f64 {
        self.scheduler.cursor()
    }

    /// Seconds of model audio waiting ahead of the output clock.
    pub fn playback_queued_ahead(&self) -> f64 {
        match self.output.as_ref() {
            Some(output) => self.scheduler.queued_ahead(output.now()),
            None => 0.0,
        }
    }

    pub fn live_tracks(&self) -> usize {
        self.stream.as_ref().map_or(0, CaptureStream::live_tracks)
    }

    /// Every release step attempted by teardown, in order.
    pub fn teardown_steps(&self) -> &[TeardownStep] {
        &self.teardown_steps
    }

    pub fn failure(&self) -> Option<&SessionError> {
        self.failure.as_ref()
    }

    /// Hand the failure cause out exactly once.
    pub fn take_failure(&mut self) -> Option<SessionError> {
        self.failure.take()
    }

    /// Acquire devices, open both audio contexts and the channel.
    ///
    /// Blocks until every resource is up or one fails. On failure the session
    /// has already released whatever it held and is Failed.
    pub fn connect(
        &mut self,
        devices: &mut dyn MediaDevices,
        connector: &dyn Connector,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }
        self.set_state(SessionState::Connecting);
        let started = Instant::now();

        let mut stream = match devices.acquire(&self.media) {
            Ok(stream) => stream,
            Err(err) => return Err(self.fail(err.into())),
        };
        stream.audio_mut().set_enabled(self.settings.mic_enabled);
        stream.video_mut().set_enabled(self.settings.camera_enabled);
        self.stream = Some(stream);

        self.input = Some(InputContext::new(
            self.settings.input_sample_rate,
            self.settings.capture_block_samples,
        ));

        match devices.open_output(
            &self.media,
            self.settings.output_sample_rate,
            self.tap.clone(),
        ) {
            Ok(output) => self.output = Some(output),
            Err(err) => return Err(self.fail(err.into())),
        }

        match connector.open(&self.channel_config) {
            Ok(channel) => self.channel = Some(channel),
            Err(err) => return Err(self.fail(err.into())),
        }

        log_timing("session_connect", started.elapsed());
        log_debug(&format!("session {} waiting for remote setup", self.id));
        Ok(())
    }

    /// Move inbound events, captured audio and due video frames along.
    pub fn pump(&mut self, now: Instant) {
        self.drain_inbound(now);
        if self.state != SessionState::Active {
            return;
        }
        self.forward_audio();
        self.forward_video(now);
        self.refresh_dropped_frames();
    }

    /// Tear everything down. Safe in every state.
    pub fn disconnect(&mut self) {
        match self.state {
            SessionState::Idle => self.set_state(SessionState::Closed),
            SessionState::Connecting | SessionState::Active => {
                self.set_state(SessionState::Closing);
                self.teardown();
                self.set_state(SessionState::Closed);
            }
            SessionState::Closing | SessionState::Closed | SessionState::Failed => {}
        }
    }

    fn drain_inbound(&mut self, now: Instant) {
        while self.state.is_busy() {
            let Some(event) = self.channel.as_mut().and_then(|channel| channel.try_recv()) else {
                break;
            };
            match (self.state, event) {
                (SessionState::Connecting, InboundEvent::SessionOpened) => self.activate(now),
                (SessionState::Connecting, InboundEvent::AudioPayload(_)) => {
                    self.stats.dropped_inbound += 1;
                }
                (SessionState::Active, InboundEvent::SessionOpened) => {}
                (SessionState::Active, InboundEvent::AudioPayload(bytes)) => {
                    self.schedule_audio(&bytes)
                }
                (SessionState::Active, InboundEvent::SessionClosed(reason)) => {
                    log_debug(&format!("session {} closed by remote: {reason}", self.id));
                    self.disconnect();
                }
                (SessionState::Connecting, InboundEvent::SessionClosed(reason)) => {
                    self.fail(SessionError::Remote(reason));
                }
                (_, InboundEvent::SessionError(cause)) => {
                    self.fail(SessionError::Remote(cause));
                }
                _ => {}
            }
        }
    }

    fn activate(&mut self, now: Instant) {
        let (Some(stream), Some(input)) = (self.stream.as_mut(), self.input.as_ref()) else {
            self.fail(SessionError::InvalidState {
                operation: "activate",
                state: self.state,
            });
            return;
        };
        self.capture = Some(CaptureNode::attach(
            stream.audio_mut(),
            input,
            self.settings.capture_channel_capacity,
            self.meter.clone(),
        ));
        let mut sampler = VideoSampler::new(
            self.settings.video_interval,
            self.settings.jpeg_quality,
            self.settings.default_frame_width,
            self.settings.default_frame_height,
        );
        sampler.start(now);
        self.video = Some(sampler);
        self.set_state(SessionState::Active);
    }

    fn schedule_audio(&mut self, bytes: &[u8]) {
        let Some(output) = self.output.as_deref_mut() else {
            return;
        };
        match self.scheduler.schedule(output, bytes) {
            Ok(scheduled) => {
                self.stats.audio_chunks_scheduled += 1;
                record_playback(
                    &self.id,
                    scheduled.start,
                    scheduled.duration,
                    scheduled.queued_ahead,
                );
            }
            Err(err) => {
                self.stats.decode_errors += 1;
                log_debug(&format!("session {} dropped inbound chunk: {err}", self.id));
            }
        }
    }

    fn forward_audio(&mut self) {
        let (Some(capture), Some(input), Some(channel)) = (
            self.capture.as_mut(),
            self.input.as_ref(),
            self.channel.as_mut(),
        ) else {
            return;
        };
        for chunk in capture.drain(input) {
            channel.send(chunk);
            self.stats.audio_chunks_sent += 1;
        }
    }

    fn forward_video(&mut self, now: Instant) {
        let (Some(sampler), Some(stream), Some(channel)) = (
            self.video.as_mut(),
            self.stream.as_mut(),
            self.channel.as_mut(),
        ) else {
            return;
        };
        if let Some(chunk) = sampler.poll(now, stream.video_mut()) {
            channel.send(chunk);
            self.stats.video_chunks_sent += 1;
        }
        self.stats.video_ticks = sampler.ticks();
    }

    fn refresh_dropped_frames(&mut self) {
        if let Some(stream) = self.stream.as_ref() {
            self.stats.dropped_capture_frames = stream.audio().dropped_frames() as u64;
        }
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        log_debug(&format!("session {} failed: {err}", self.id));
        if self.state.is_busy() {
            self.set_state(SessionState::Closing);
            self.teardown();
            self.set_state(SessionState::Failed);
        }
        self.failure = Some(err.clone());
        err
    }

    fn step(&mut self, name: &'static str, result: Result<(), ResourceReleaseError>) {
        let error = match result {
            Ok(()) => {
                record_teardown_step(&self.id, name, None);
                None
            }
            Err(err) => {
                let message = err.to_string();
                log_debug(&format!("session {} teardown {name}: {message}", self.id));
                record_teardown_step(&self.id, name, Some(&message));
                Some(message)
            }
        };
        self.teardown_steps.push(TeardownStep { name, error });
    }

    /// Release in fixed order, attempting every step whatever the earlier ones did.
    fn teardown(&mut self) {
        if let Some(mut sampler) = self.video.take() {
            self.stats.video_ticks = sampler.ticks();
            let result = sampler.stop();
            self.step("video_timer", result);
        }
        if let Some(mut capture) = self.capture.take() {
            let result = match self.stream.as_mut() {
                Some(stream) => capture.disconnect(stream.audio_mut()),
                None => Err(ResourceReleaseError::AlreadyReleased("capture stream")),
            };
            self.step("capture_node", result);
        }
        self.refresh_dropped_frames();
        if let Some(mut stream) = self.stream.take() {
            let errors = stream.stop_all();
            if errors.is_empty() {
                self.step("tracks", Ok(()));
            }
            for err in errors {
                self.step("tracks", Err(err));
            }
        }
        if let Some(mut input) = self.input.take() {
            let result = input.close();
            self.step("input_context", result);
        }
        if let Some(mut output) = self.output.take() {
            let result = output.close();
            self.step("output_context", result);
        }
        if let Some(mut channel) = self.channel.take() {
            channel.close();
            self.step("channel", Ok(()));
        }
        self.meter.reset();
        self.tap.clear();
    }

    fn set_state(&mut self, to: SessionState) {
        if !self.state.can_transition(to) {
            log_debug(&format!(
                "session {} ignoring transition {} -> {}",
                self.id, self.state, to
            ));
            return;
        }
        record_transition(&self.id, self.state, to);
        log_debug(&format!("session {}: {} -> {}", self.id, self.state, to));
        self.state = to;
        set_log_session(&self.id, to);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state.is_busy() {
            self.disconnect();
        }
    }
}
