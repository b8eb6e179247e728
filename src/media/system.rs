use super::{
    CaptureStream, MediaDevices, MediaTrack, MicrophoneTrack, TestPatternTrack, VideoTrack,
};
use crate::audio::{AudioOutput, FrequencyTap, SpeakerOutput};
use crate::config::{MediaRequest, VideoSourceKind};
use crate::error::DeviceError;
use crate::log_debug;

/// Real hardware: CPAL for audio, nokhwa (when built in) for video.
#[derive(Debug, Default)]
pub struct SystemDevices;

impl SystemDevices {
    pub fn new() -> Self {
        Self
    }
}

fn open_video(request: &MediaRequest) -> Result<Box<dyn VideoTrack>, DeviceError> {
    match request.video_source {
        VideoSourceKind::TestPattern => Ok(Box::new(TestPatternTrack::new(
            request.frame_width,
            request.frame_height,
            true,
        ))),
        #[cfg(feature = "camera")]
        VideoSourceKind::Camera => Ok(Box::new(super::CameraTrack::open(
            request.camera_index,
            true,
            request.device_timeout,
        )?)),
        #[cfg(not(feature = "camera"))]
        VideoSourceKind::Camera => Err(DeviceError::Unavailable {
            device: "camera".to_string(),
            reason: "built without the camera feature".to_string(),
        }),
    }
}

impl MediaDevices for SystemDevices {
    fn acquire(&mut self, request: &MediaRequest) -> Result<CaptureStream, DeviceError> {
        let mut audio = MicrophoneTrack::open(
            request.input_device.as_deref(),
            true,
            request.device_timeout,
        )?;
        let video = match open_video(request) {
            Ok(video) => video,
            Err(err) => {
                // Never leave a half-acquired stream behind.
                if let Err(release) = audio.stop() {
                    log_debug(&format!("microphone release after video failure: {release}"));
                }
                return Err(err);
            }
        };
        log_debug(&format!(
            "capture stream acquired (video source: {})",
            request.video_source.label()
        ));
        Ok(CaptureStream::new(Box::new(audio), video))
    }

    fn open_output(
        &mut self,
        request: &MediaRequest,
        sample_rate: u32,
        tap: FrequencyTap,
    ) -> Result<Box<dyn AudioOutput>, DeviceError> {
        let output = SpeakerOutput::open(
            request.output_device.as_deref(),
            sample_rate,
            tap,
            request.device_timeout,
        )?;
        log_debug(&format!("playback device: {}", output.device_name()));
        Ok(Box::new(output))
    }
}
