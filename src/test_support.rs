//! In-crate fakes for devices and playback, shared by the unit tests.

use crate::audio::{AudioOutput, FrequencyTap, Mixer, ScheduledBuffer};
use crate::config::MediaRequest;
use crate::error::{DeviceError, ResourceReleaseError};
use crate::lock_or_recover;
use crate::media::{
    AudioTrack, CaptureStream, MediaDevices, MediaTrack, RgbFrame, TrackKind, VideoTrack,
};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared view of a fake microphone: tests push device frames through it.
#[derive(Clone, Default)]
pub(crate) struct MicHandle {
    sink: Arc<Mutex<Option<(usize, Sender<Vec<f32>>)>>>,
    enabled: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

impl MicHandle {
    /// Deliver one device frame of the connected size, as a real callback would.
    pub(crate) fn emit(&self, value: f32) -> bool {
        if !self.enabled.load(Ordering::SeqCst) {
            return false;
        }
        let guard = lock_or_recover(&self.sink, "fake_mic");
        match guard.as_ref() {
            Some((frame_samples, sink)) => {
                if sink.try_send(vec![value; *frame_samples]).is_err() {
                    self.dropped.fetch_add(1, Ordering::SeqCst);
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn frame_samples(&self) -> Option<usize> {
        lock_or_recover(&self.sink, "fake_mic")
            .as_ref()
            .map(|(n, _)| *n)
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// The device went away on its own, e.g. unplugged mid-session.
    pub(crate) fn end(&self) {
        self.live.store(false, Ordering::SeqCst);
        lock_or_recover(&self.sink, "fake_mic").take();
    }
}

pub(crate) struct FakeMic {
    rate: u32,
    handle: MicHandle,
}

impl FakeMic {
    pub(crate) fn new(rate: u32) -> (Self, MicHandle) {
        let handle = MicHandle::default();
        handle.enabled.store(true, Ordering::SeqCst);
        handle.live.store(true, Ordering::SeqCst);
        (
            Self {
                rate,
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl MediaTrack for FakeMic {
    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn label(&self) -> String {
        "fake mic".to_string()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.handle.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.handle.is_enabled()
    }

    fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    fn stop(&mut self) -> Result<(), ResourceReleaseError> {
        if !self.handle.live.swap(false, Ordering::SeqCst) {
            return Err(ResourceReleaseError::AlreadyReleased("fake mic"));
        }
        lock_or_recover(&self.handle.sink, "fake_mic").take();
        Ok(())
    }
}

impl AudioTrack for FakeMic {
    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn connect(&mut self, frame_samples: usize, sink: Sender<Vec<f32>>) {
        self.handle.connects.fetch_add(1, Ordering::SeqCst);
        *lock_or_recover(&self.handle.sink, "fake_mic") = Some((frame_samples, sink));
    }

    fn disconnect(&mut self) -> bool {
        lock_or_recover(&self.handle.sink, "fake_mic").take().is_some()
    }

    fn dropped_frames(&self) -> usize {
        self.handle.dropped.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub(crate) struct CameraHandle {
    enabled: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
    frames: Arc<AtomicUsize>,
    refuse_stop: Arc<AtomicBool>,
}

impl CameraHandle {
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn frames_read(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    /// Make `stop()` fail while leaving the camera running.
    pub(crate) fn refuse_stop(&self) {
        self.refuse_stop.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct FakeCamera {
    handle: CameraHandle,
    /// None models a camera that has not produced a frame yet.
    size: Option<(u32, u32)>,
}

impl FakeCamera {
    pub(crate) fn new(size: Option<(u32, u32)>) -> (Self, CameraHandle) {
        let handle = CameraHandle::default();
        handle.enabled.store(true, Ordering::SeqCst);
        handle.live.store(true, Ordering::SeqCst);
        (
            Self {
                handle: handle.clone(),
                size,
            },
            handle,
        )
    }
}

impl MediaTrack for FakeCamera {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn label(&self) -> String {
        "fake camera".to_string()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.handle.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.handle.is_enabled()
    }

    fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    fn stop(&mut self) -> Result<(), ResourceReleaseError> {
        if self.handle.refuse_stop.load(Ordering::SeqCst) {
            return Err(ResourceReleaseError::Failed {
                resource: "fake camera",
                reason: "driver did not respond".to_string(),
            });
        }
        if !self.handle.live.swap(false, Ordering::SeqCst) {
            return Err(ResourceReleaseError::AlreadyReleased("fake camera"));
        }
        Ok(())
    }
}

impl VideoTrack for FakeCamera {
    fn native_size(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn current_frame(&mut self) -> Option<RgbFrame> {
        self.handle.frames.fetch_add(1, Ordering::SeqCst);
        self.size.map(|(w, h)| RgbFrame::black(w, h))
    }
}

/// Output context with a clock the test moves by rendering.
#[derive(Clone)]
pub(crate) struct ManualOutput {
    mixer: Arc<Mutex<Mixer>>,
    tap: FrequencyTap,
    enqueued: Arc<Mutex<Vec<ScheduledBuffer>>>,
    closed: Arc<AtomicBool>,
}

impl ManualOutput {
    pub(crate) fn new(sample_rate: u32, tap: FrequencyTap) -> Self {
        Self {
            mixer: Arc::new(Mutex::new(Mixer::new(sample_rate, tap.clone()))),
            tap,
            enqueued: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Advance the clock by rendering `frames` samples.
    pub(crate) fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        lock_or_recover(&self.mixer, "manual_mixer").render(&mut out);
        out
    }

    pub(crate) fn enqueued(&self) -> Vec<ScheduledBuffer> {
        lock_or_recover(&self.enqueued, "manual_enqueued").clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl AudioOutput for ManualOutput {
    fn sample_rate(&self) -> u32 {
        lock_or_recover(&self.mixer, "manual_mixer").sample_rate()
    }

    fn now(&self) -> f64 {
        lock_or_recover(&self.mixer, "manual_mixer").now()
    }

    fn enqueue(&mut self, buffer: ScheduledBuffer) {
        lock_or_recover(&self.enqueued, "manual_enqueued").push(buffer.clone());
        lock_or_recover(&self.mixer, "manual_mixer").add(buffer);
    }

    fn frequency_tap(&self) -> FrequencyTap {
        self.tap.clone()
    }

    fn close(&mut self) -> Result<(), ResourceReleaseError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ResourceReleaseError::AlreadyReleased("output context"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct DeviceLog {
    acquisitions: AtomicUsize,
    outputs: AtomicUsize,
    fail_acquire: Mutex<Option<DeviceError>>,
    fail_output: Mutex<Option<DeviceError>>,
    mic: Mutex<Option<MicHandle>>,
    camera: Mutex<Option<CameraHandle>>,
    output: Mutex<Option<ManualOutput>>,
}

/// Test-side view of [`FakeDevices`].
#[derive(Clone, Default)]
pub(crate) struct DeviceLedger {
    log: Arc<DeviceLog>,
}

impl DeviceLedger {
    pub(crate) fn acquisitions(&self) -> usize {
        self.log.acquisitions.load(Ordering::SeqCst)
    }

    pub(crate) fn outputs(&self) -> usize {
        self.log.outputs.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_acquire(&self, err: Option<DeviceError>) {
        *lock_or_recover(&self.log.fail_acquire, "fake_devices") = err;
    }

    pub(crate) fn fail_output(&self, err: Option<DeviceError>) {
        *lock_or_recover(&self.log.fail_output, "fake_devices") = err;
    }

    pub(crate) fn mic(&self) -> Option<MicHandle> {
        lock_or_recover(&self.log.mic, "fake_devices").clone()
    }

    pub(crate) fn camera(&self) -> Option<CameraHandle> {
        lock_or_recover(&self.log.camera, "fake_devices").clone()
    }

    pub(crate) fn output(&self) -> Option<ManualOutput> {
        lock_or_recover(&self.log.output, "fake_devices").clone()
    }

    /// Tracks still running across everything ever acquired most recently.
    pub(crate) fn live_tracks(&self) -> usize {
        let mic = self.mic().is_some_and(|mic| mic.is_live());
        let camera = self.camera().is_some_and(|camera| camera.is_live());
        usize::from(mic) + usize::from(camera)
    }
}

pub(crate) struct FakeDevices {
    mic_rate: u32,
    camera_size: Option<(u32, u32)>,
    ledger: DeviceLedger,
}

impl FakeDevices {
    pub(crate) fn new(mic_rate: u32, camera_size: Option<(u32, u32)>) -> (Self, DeviceLedger) {
        let ledger = DeviceLedger::default();
        (
            Self {
                mic_rate,
                camera_size,
                ledger: ledger.clone(),
            },
            ledger,
        )
    }
}

impl MediaDevices for FakeDevices {
    fn acquire(&mut self, _request: &MediaRequest) -> Result<CaptureStream, DeviceError> {
        let log = &self.ledger.log;
        log.acquisitions.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock_or_recover(&log.fail_acquire, "fake_devices").clone() {
            return Err(err);
        }
        let (mic, mic_handle) = FakeMic::new(self.mic_rate);
        let (camera, camera_handle) = FakeCamera::new(self.camera_size);
        *lock_or_recover(&log.mic, "fake_devices") = Some(mic_handle);
        *lock_or_recover(&log.camera, "fake_devices") = Some(camera_handle);
        Ok(CaptureStream::new(Box::new(mic), Box::new(camera)))
    }

    fn open_output(
        &mut self,
        _request: &MediaRequest,
        sample_rate: u32,
        tap: FrequencyTap,
    ) -> Result<Box<dyn AudioOutput>, DeviceError> {
        let log = &self.ledger.log;
        log.outputs.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock_or_recover(&log.fail_output, "fake_devices").clone() {
            return Err(err);
        }
        let output = ManualOutput::new(sample_rate, tap);
        *lock_or_recover(&log.output, "fake_devices") = Some(output.clone());
        Ok(Box::new(output))
    }
}
