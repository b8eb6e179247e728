//! Camera capture via nokhwa.
//!
//! The camera handle lives on its own grab thread, which keeps the newest
//! decoded frame in a shared slot. The video sampler reads that slot at its
//! own pace, so a slow encoder never stalls the camera.

use super::{MediaTrack, RgbFrame, TrackKind, VideoTrack};
use crate::error::{DeviceError, ResourceReleaseError};
use crate::{lock_or_recover, log_debug};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const CAMERA_HINT: &str = "Allow camera access for your terminal in the OS privacy settings.";

pub struct CameraTrack {
    name: String,
    enabled: bool,
    latest: Arc<Mutex<Option<RgbFrame>>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CameraTrack {
    pub fn open(index: u32, enabled: bool, timeout: Duration) -> Result<Self, DeviceError> {
        let latest = Arc::new(Mutex::new(None));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<String, DeviceError>>();
        let slot = latest.clone();
        let stop = shutdown.clone();
        let handle = thread::Builder::new()
            .name("voxlive-camera".to_string())
            .spawn(move || grab_loop(index, slot, stop, ready_tx))
            .map_err(|err| DeviceError::StartFailed {
                device: "camera".to_string(),
                reason: err.to_string(),
            })?;

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(name)) => {
                log_debug(&format!("camera '{name}' opened (index {index})"));
                Ok(Self {
                    name,
                    enabled,
                    latest,
                    shutdown,
                    handle: Some(handle),
                })
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(RecvTimeoutError::Timeout) => {
                shutdown.store(true, Ordering::SeqCst);
                Err(DeviceError::Timeout {
                    device: "camera".to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                Err(DeviceError::StartFailed {
                    device: "camera".to_string(),
                    reason: "camera thread exited during startup".to_string(),
                })
            }
        }
    }
}

fn grab_loop(
    index: u32,
    latest: Arc<Mutex<Option<RgbFrame>>>,
    shutdown: Arc<AtomicBool>,
    ready_tx: mpsc::Sender<Result<String, DeviceError>>,
) {
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
    let mut camera = match Camera::new(CameraIndex::Index(index), requested) {
        Ok(camera) => camera,
        Err(err) => {
            let _ = ready_tx.send(Err(DeviceError::from_backend("camera", err, CAMERA_HINT)));
            return;
        }
    };
    if let Err(err) = camera.open_stream() {
        let _ = ready_tx.send(Err(DeviceError::from_backend("camera", err, CAMERA_HINT)));
        return;
    }
    let name = camera.info().human_name();
    if ready_tx.send(Ok(name)).is_err() {
        let _ = camera.stop_stream();
        return;
    }

    while !shutdown.load(Ordering::Relaxed) {
        let decoded = camera
            .frame()
            .and_then(|buffer| buffer.decode_image::<RgbFormat>());
        match decoded {
            Ok(image) => {
                let (width, height) = (image.width(), image.height());
                *lock_or_recover(&latest, "camera_frame") = Some(RgbFrame {
                    width,
                    height,
                    pixels: image.into_raw(),
                });
            }
            Err(err) => {
                log_debug(&format!("camera frame error: {err}"));
                thread::sleep(Duration::from_millis(20));
            }
        }
    }
    if let Err(err) = camera.stop_stream() {
        log_debug(&format!("camera stop_stream failed: {err}"));
    }
}

impl MediaTrack for CameraTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    fn stop(&mut self) -> Result<(), ResourceReleaseError> {
        let Some(handle) = self.handle.take() else {
            return Err(ResourceReleaseError::AlreadyReleased("camera track"));
        };
        self.shutdown.store(true, Ordering::SeqCst);
        lock_or_recover(&self.latest, "camera_frame").take();
        handle.join().map_err(|_| ResourceReleaseError::Failed {
            resource: "camera track",
            reason: "camera thread panicked".to_string(),
        })
    }
}

impl VideoTrack for CameraTrack {
    fn native_size(&self) -> Option<(u32, u32)> {
        lock_or_recover(&self.latest, "camera_frame")
            .as_ref()
            .map(|frame| (frame.width, frame.height))
    }

    fn current_frame(&mut self) -> Option<RgbFrame> {
        if self.handle.is_none() {
            return None;
        }
        lock_or_recover(&self.latest, "camera_frame").clone()
    }
}

impl Drop for CameraTrack {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop();
        }
    }
}
