//! System microphone via CPAL.
//!
//! The input stream runs for the whole life of the track. Frames only leave
//! the callback while a capture node is connected and the track is enabled.

use super::{AudioTrack, MediaTrack, TrackKind};
use crate::audio::device_thread::DeviceThread;
use crate::audio::dispatch::FrameDispatcher;
use crate::error::{DeviceError, ResourceReleaseError};
use crate::{lock_or_recover, log_debug};
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// List microphone names so the CLI can expose a human-friendly selector.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host.input_devices().context("no input devices available")?;
    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            names.push(name);
        }
    }
    Ok(names)
}

pub fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}

struct StreamInfo {
    device_name: String,
    sample_rate: u32,
}

pub struct MicrophoneTrack {
    device_name: String,
    sample_rate: u32,
    enabled: Arc<AtomicBool>,
    dispatcher: Arc<Mutex<FrameDispatcher>>,
    dropped: Arc<AtomicUsize>,
    stream: DeviceThread,
}

impl MicrophoneTrack {
    /// Open the preferred (or default) microphone and start its stream.
    pub fn open(
        preferred_device: Option<&str>,
        enabled: bool,
        timeout: Duration,
    ) -> Result<Self, DeviceError> {
        let enabled = Arc::new(AtomicBool::new(enabled));
        let dropped = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Mutex::new(FrameDispatcher::new(dropped.clone())));
        let preferred = preferred_device.map(str::to_string);
        let stream_dispatcher = dispatcher.clone();
        let stream_enabled = enabled.clone();
        let stream_dropped = dropped.clone();
        let (stream, info) = DeviceThread::spawn("microphone", timeout, move || {
            build_input_stream(
                preferred.as_deref(),
                stream_dispatcher,
                stream_enabled,
                stream_dropped,
            )
        })?;
        log_debug(&format!(
            "microphone '{}' opened at {}Hz",
            info.device_name, info.sample_rate
        ));
        Ok(Self {
            device_name: info.device_name,
            sample_rate: info.sample_rate,
            enabled,
            dispatcher,
            dropped,
            stream,
        })
    }
}

impl MediaTrack for MicrophoneTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn label(&self) -> String {
        self.device_name.clone()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn is_live(&self) -> bool {
        self.stream.is_running()
    }

    fn stop(&mut self) -> Result<(), ResourceReleaseError> {
        lock_or_recover(&self.dispatcher, "mic_dispatcher").detach();
        self.stream.stop().map_err(|err| match err {
            ResourceReleaseError::AlreadyReleased(_) => {
                ResourceReleaseError::AlreadyReleased("microphone track")
            }
            other => other,
        })
    }
}

impl AudioTrack for MicrophoneTrack {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn connect(&mut self, frame_samples: usize, sink: Sender<Vec<f32>>) {
        lock_or_recover(&self.dispatcher, "mic_dispatcher").attach(frame_samples, sink);
    }

    fn disconnect(&mut self) -> bool {
        lock_or_recover(&self.dispatcher, "mic_dispatcher").detach()
    }

    fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn find_input_device(host: &cpal::Host, preferred: Option<&str>) -> Result<cpal::Device, DeviceError> {
    match preferred {
        Some(name) => {
            let mut devices = host
                .input_devices()
                .map_err(|err| DeviceError::from_backend("microphone", err, mic_permission_hint()))?;
            devices
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| DeviceError::Unavailable {
                    device: "microphone".to_string(),
                    reason: format!("input device '{name}' not found"),
                })
        }
        None => host
            .default_input_device()
            .ok_or_else(|| DeviceError::Unavailable {
                device: "microphone".to_string(),
                reason: "no default input device available".to_string(),
            }),
    }
}

fn feed<T, F>(
    dispatcher: &Mutex<FrameDispatcher>,
    enabled: &AtomicBool,
    dropped: &AtomicUsize,
    data: &[T],
    channels: usize,
    convert: F,
) where
    T: Copy,
    F: FnMut(T) -> f32,
{
    match dispatcher.try_lock() {
        Ok(mut pump) => {
            if enabled.load(Ordering::Relaxed) {
                pump.push(data, channels, convert);
            } else {
                pump.discard_pending();
            }
        }
        Err(_) => {
            dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn build_input_stream(
    preferred: Option<&str>,
    dispatcher: Arc<Mutex<FrameDispatcher>>,
    enabled: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
) -> Result<(cpal::Stream, StreamInfo), DeviceError> {
    let hint = mic_permission_hint();
    let host = cpal::default_host();
    let device = find_input_device(&host, preferred)?;
    let device_name = device
        .name()
        .unwrap_or_else(|_| "unknown input device".to_string());
    let default_config = device
        .default_input_config()
        .map_err(|err| DeviceError::from_backend("microphone", err, hint))?;
    let format = default_config.sample_format();
    let config: StreamConfig = default_config.into();
    let sample_rate = config.sample_rate.0;
    let channels = usize::from(config.channels.max(1));

    log_debug(&format!(
        "Microphone config: format={format:?} sample_rate={sample_rate}Hz channels={channels}"
    ));

    let err_fn = |err| log_debug(&format!("audio_stream_error: {err}"));
    let build_err =
        |err: cpal::BuildStreamError| DeviceError::from_backend("microphone", err, hint);
    let stream = match format {
        SampleFormat::F32 => {
            let (dispatcher, enabled, dropped) = (dispatcher.clone(), enabled.clone(), dropped.clone());
            device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _| {
                        feed(&dispatcher, &enabled, &dropped, data, channels, |s| s)
                    },
                    err_fn,
                    None,
                )
                .map_err(build_err)?
        }
        SampleFormat::I16 => {
            let (dispatcher, enabled, dropped) = (dispatcher.clone(), enabled.clone(), dropped.clone());
            device
                .build_input_stream(
                    &config,
                    move |data: &[i16], _| {
                        feed(&dispatcher, &enabled, &dropped, data, channels, |s| {
                            s as f32 / 32_768.0
                        })
                    },
                    err_fn,
                    None,
                )
                .map_err(build_err)?
        }
        SampleFormat::U16 => {
            let (dispatcher, enabled, dropped) = (dispatcher.clone(), enabled.clone(), dropped.clone());
            device
                .build_input_stream(
                    &config,
                    move |data: &[u16], _| {
                        feed(&dispatcher, &enabled, &dropped, data, channels, |s| {
                            (s as f32 - 32_768.0) / 32_768.0
                        })
                    },
                    err_fn,
                    None,
                )
                .map_err(build_err)?
        }
        other => {
            return Err(DeviceError::UnsupportedFormat {
                device: device_name,
                format: format!("{other:?}"),
            })
        }
    };

    stream
        .play()
        .map_err(|err| DeviceError::from_backend("microphone", err, hint))?;
    Ok((
        stream,
        StreamInfo {
            device_name,
            sample_rate,
        },
    ))
}
