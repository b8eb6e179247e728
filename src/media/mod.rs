//! Capture devices and the track abstraction the session talks to.
//!
//! A [`CaptureStream`] is one microphone track plus one video track, acquired
//! together and released together. Tracks can be enabled and disabled without
//! stopping them; a disabled track simply contributes nothing.

#[cfg(feature = "camera")]
mod camera;
mod microphone;
mod pattern;
mod system;

use crate::audio::{AudioOutput, FrequencyTap};
use crate::config::MediaRequest;
use crate::error::{DeviceError, ResourceReleaseError};
use crossbeam_channel::Sender;

#[cfg(feature = "camera")]
pub use camera::CameraTrack;
pub use microphone::{list_input_devices, mic_permission_hint, MicrophoneTrack};
pub use pattern::TestPatternTrack;
pub use system::SystemDevices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Packed 8-bit RGB pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbFrame {
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 3],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == self.width as usize * self.height as usize * 3
    }
}

pub trait MediaTrack: Send {
    fn kind(&self) -> TrackKind;

    fn label(&self) -> String;

    /// Flip the enable switch. The underlying device keeps running.
    fn set_enabled(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    fn is_live(&self) -> bool;

    fn stop(&mut self) -> Result<(), ResourceReleaseError>;
}

pub trait AudioTrack: MediaTrack {
    /// Native rate of the frames this track delivers.
    fn sample_rate(&self) -> u32;

    /// Deliver mono frames of `frame_samples` samples to `sink` until disconnected.
    fn connect(&mut self, frame_samples: usize, sink: Sender<Vec<f32>>);

    /// Returns false when nothing was connected.
    fn disconnect(&mut self) -> bool;

    /// Frames lost because the sink was full.
    fn dropped_frames(&self) -> usize;
}

pub trait VideoTrack: MediaTrack {
    /// Native size of the source, once it has produced a frame.
    fn native_size(&self) -> Option<(u32, u32)>;

    /// The newest frame, or None before the source has produced one.
    fn current_frame(&mut self) -> Option<RgbFrame>;
}

pub struct CaptureStream {
    audio: Box<dyn AudioTrack>,
    video: Box<dyn VideoTrack>,
}

impl CaptureStream {
    pub fn new(audio: Box<dyn AudioTrack>, video: Box<dyn VideoTrack>) -> Self {
        Self { audio, video }
    }

    pub fn audio(&self) -> &dyn AudioTrack {
        self.audio.as_ref()
    }

    pub fn audio_mut(&mut self) -> &mut dyn AudioTrack {
        self.audio.as_mut()
    }

    pub fn video(&self) -> &dyn VideoTrack {
        self.video.as_ref()
    }

    pub fn video_mut(&mut self) -> &mut dyn VideoTrack {
        self.video.as_mut()
    }

    pub fn live_tracks(&self) -> usize {
        usize::from(self.audio.is_live()) + usize::from(self.video.is_live())
    }

    /// Stop every track, attempting each one even if an earlier stop failed.
    pub fn stop_all(&mut self) -> Vec<ResourceReleaseError> {
        let mut errors = Vec::new();
        if let Err(err) = self.audio.stop() {
            errors.push(err);
        }
        if let Err(err) = self.video.stop() {
            errors.push(err);
        }
        errors
    }
}

/// Source of capture streams and playback contexts.
pub trait MediaDevices {
    fn acquire(&mut self, request: &MediaRequest) -> Result<CaptureStream, DeviceError>;

    fn open_output(
        &mut self,
        request: &MediaRequest,
        sample_rate: u32,
        tap: FrequencyTap,
    ) -> Result<Box<dyn AudioOutput>, DeviceError>;
}
