//! System speaker output via CPAL.
//!
//! The device callback owns the [`Mixer`] outright and pulls from it through a
//! [`RateAdapter`], so the hardware can run at whatever rate it prefers. The
//! session side holds a [`MixerFeed`]: scheduled buffers travel to the callback
//! over a channel and the clock comes back as an atomic frame count, so the
//! render path never waits on the session loop.

use super::analyser::FrequencyTap;
use super::device_thread::DeviceThread;
use super::mixer::Mixer;
use super::pcm::float_to_i16;
use super::playback::{AudioOutput, ScheduledBuffer};
use crate::error::{DeviceError, ResourceReleaseError};
use crate::log_debug;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const RENDER_BLOCK_FRAMES: usize = 128;
const OUTPUT_HINT: &str = "Check that the output device is connected and not in exclusive use.";

/// List speaker names so the CLI can expose a human-friendly selector.
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .context("no output devices available")?;
    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Streams mixer output at the source rate into a device running at another
/// rate, interpolating linearly between neighbouring samples.
pub(crate) struct RateAdapter {
    step: f64,
    phase: f64,
    prev: f32,
    next: f32,
    pending: VecDeque<f32>,
    block: Vec<f32>,
}

impl RateAdapter {
    pub(crate) fn new(source_rate: u32, device_rate: u32) -> Self {
        Self {
            step: f64::from(source_rate.max(1)) / f64::from(device_rate.max(1)),
            phase: 1.0,
            prev: 0.0,
            next: 0.0,
            pending: VecDeque::with_capacity(RENDER_BLOCK_FRAMES),
            block: vec![0.0; RENDER_BLOCK_FRAMES],
        }
    }

    pub(crate) fn next_sample(&mut self, mixer: &mut Mixer) -> f32 {
        while self.phase >= 1.0 {
            self.prev = self.next;
            self.next = self.pull(mixer);
            self.phase -= 1.0;
        }
        let value = self.prev + (self.next - self.prev) * self.phase as f32;
        self.phase += self.step;
        value
    }

    fn pull(&mut self, mixer: &mut Mixer) -> f32 {
        if let Some(sample) = self.pending.pop_front() {
            return sample;
        }
        mixer.render(&mut self.block);
        self.pending.extend(self.block.iter().copied());
        self.pending.pop_front().unwrap_or(0.0)
    }
}

/// Session side of the render path.
pub(crate) struct MixerFeed {
    sample_rate: u32,
    buffers: Sender<ScheduledBuffer>,
    rendered: Arc<AtomicU64>,
}

impl MixerFeed {
    pub(crate) fn now(&self) -> f64 {
        self.rendered.load(Ordering::Acquire) as f64 / f64::from(self.sample_rate)
    }

    /// Never blocks. A buffer sent after the renderer is gone is dropped.
    pub(crate) fn enqueue(&self, buffer: ScheduledBuffer) -> bool {
        self.buffers.send(buffer).is_ok()
    }
}

/// Callback side of the render path.
pub(crate) struct MixerRenderer {
    mixer: Mixer,
    adapter: RateAdapter,
    buffers: Receiver<ScheduledBuffer>,
    rendered: Arc<AtomicU64>,
}

impl MixerRenderer {
    pub(crate) fn fill<T, F>(&mut self, data: &mut [T], channels: usize, convert: F)
    where
        T: Copy,
        F: Fn(f32) -> T,
    {
        while let Ok(buffer) = self.buffers.try_recv() {
            self.mixer.add(buffer);
        }
        for frame in data.chunks_mut(channels.max(1)) {
            let value = convert(self.adapter.next_sample(&mut self.mixer));
            frame.fill(value);
        }
        self.rendered.store(self.mixer.position(), Ordering::Release);
    }
}

pub(crate) fn render_path(
    sample_rate: u32,
    device_rate: u32,
    tap: FrequencyTap,
) -> (MixerFeed, MixerRenderer) {
    let (buffers_tx, buffers_rx) = unbounded();
    let rendered = Arc::new(AtomicU64::new(0));
    let feed = MixerFeed {
        sample_rate: sample_rate.max(1),
        buffers: buffers_tx,
        rendered: rendered.clone(),
    };
    let renderer = MixerRenderer {
        mixer: Mixer::new(sample_rate, tap),
        adapter: RateAdapter::new(sample_rate, device_rate),
        buffers: buffers_rx,
        rendered,
    };
    (feed, renderer)
}

pub struct SpeakerOutput {
    sample_rate: u32,
    feed: MixerFeed,
    tap: FrequencyTap,
    stream: DeviceThread,
    device_name: String,
}

impl SpeakerOutput {
    /// Open the preferred (or default) output device with a clock at `sample_rate`.
    pub fn open(
        preferred_device: Option<&str>,
        sample_rate: u32,
        tap: FrequencyTap,
        timeout: Duration,
    ) -> Result<Self, DeviceError> {
        let preferred = preferred_device.map(str::to_string);
        let stream_tap = tap.clone();
        let (stream, (device_name, feed)) = DeviceThread::spawn("speaker", timeout, move || {
            build_output_stream(preferred.as_deref(), stream_tap, sample_rate)
        })?;
        log_debug(&format!("speaker output opened at {sample_rate}Hz clock"));
        Ok(Self {
            sample_rate,
            feed,
            tap,
            stream,
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl AudioOutput for SpeakerOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn now(&self) -> f64 {
        self.feed.now()
    }

    fn enqueue(&mut self, buffer: ScheduledBuffer) {
        if !self.stream.is_running() {
            return;
        }
        if !self.feed.enqueue(buffer) {
            log_debug("speaker renderer gone; dropping scheduled buffer");
        }
    }

    fn frequency_tap(&self) -> FrequencyTap {
        self.tap.clone()
    }

    fn close(&mut self) -> Result<(), ResourceReleaseError> {
        self.stream.stop().map_err(|err| match err {
            ResourceReleaseError::AlreadyReleased(_) => {
                ResourceReleaseError::AlreadyReleased("output context")
            }
            other => other,
        })
    }
}

fn find_output_device(host: &cpal::Host, preferred: Option<&str>) -> Result<cpal::Device, DeviceError> {
    match preferred {
        Some(name) => {
            let mut devices = host
                .output_devices()
                .map_err(|err| DeviceError::from_backend("speaker", err, OUTPUT_HINT))?;
            devices
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| DeviceError::Unavailable {
                    device: "speaker".to_string(),
                    reason: format!("output device '{name}' not found"),
                })
        }
        None => host
            .default_output_device()
            .ok_or_else(|| DeviceError::Unavailable {
                device: "speaker".to_string(),
                reason: "no default output device available".to_string(),
            }),
    }
}

fn build_output_stream(
    preferred: Option<&str>,
    tap: FrequencyTap,
    sample_rate: u32,
) -> Result<(cpal::Stream, (String, MixerFeed)), DeviceError> {
    let host = cpal::default_host();
    let device = find_output_device(&host, preferred)?;
    let device_name = device
        .name()
        .unwrap_or_else(|_| "unknown output device".to_string());
    let default_config = device
        .default_output_config()
        .map_err(|err| DeviceError::from_backend("speaker", err, OUTPUT_HINT))?;
    let format = default_config.sample_format();
    let config: StreamConfig = default_config.into();
    let device_rate = config.sample_rate.0;
    let channels = usize::from(config.channels.max(1));

    log_debug(&format!(
        "Speaker config: format={format:?} sample_rate={device_rate}Hz channels={channels}"
    ));

    let (feed, mut renderer) = render_path(sample_rate, device_rate, tap);
    let err_fn = |err| log_debug(&format!("audio_output_error: {err}"));
    let build_err = |err: cpal::BuildStreamError| DeviceError::from_backend("speaker", err, OUTPUT_HINT);
    let stream = match format {
        SampleFormat::F32 => device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _| renderer.fill(data, channels, |s| s.clamp(-1.0, 1.0)),
                err_fn,
                None,
            )
            .map_err(build_err)?,
        SampleFormat::I16 => device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _| renderer.fill(data, channels, float_to_i16),
                err_fn,
                None,
            )
            .map_err(build_err)?,
        SampleFormat::U16 => device
            .build_output_stream(
                &config,
                move |data: &mut [u16], _| {
                    renderer.fill(data, channels, |s| (i32::from(float_to_i16(s)) + 32_768) as u16)
                },
                err_fn,
                None,
            )
            .map_err(build_err)?,
        other => {
            return Err(DeviceError::UnsupportedFormat {
                device: device_name,
                format: format!("{other:?}"),
            })
        }
    };

    stream
        .play()
        .map_err(|err| DeviceError::from_backend("speaker", err, OUTPUT_HINT))?;
    Ok((stream, (device_name, feed)))
}
