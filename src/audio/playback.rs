//! Gapless scheduling of inbound model audio on the output clock.

use super::analyser::FrequencyTap;
use super::pcm::decode_pcm16;
use crate::error::{DecodeError, ResourceReleaseError};

/// Mono samples that must start playing exactly at `start` seconds on the
/// output clock.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledBuffer {
    pub start: f64,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl ScheduledBuffer {
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate.max(1))
    }
}

/// The playback side of a session: a monotonically advancing clock plus a
/// timeline that accepts buffers for future start times.
pub trait AudioOutput: Send {
    fn sample_rate(&self) -> u32;

    /// Current position of the output clock in seconds.
    fn now(&self) -> f64;

    fn enqueue(&mut self, buffer: ScheduledBuffer);

    /// Receives every rendered block for visualizers.
    fn frequency_tap(&self) -> FrequencyTap;

    fn close(&mut self) -> Result<(), ResourceReleaseError>;
}

/// Where a decoded chunk landed on the output clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduled {
    pub start: f64,
    pub duration: f64,
    /// Audio queued beyond the clock once this chunk is included.
    pub queued_ahead: f64,
}

/// Places each chunk at `max(now, cursor)` and advances the cursor by the
/// chunk's duration. The cursor never moves backwards and chunks are never
/// reordered; a burst simply queues further ahead of the clock.
#[derive(Debug, Clone)]
pub struct PlaybackScheduler {
    sample_rate: u32,
    cursor: f64,
    scheduled: u64,
}

impl PlaybackScheduler {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            cursor: 0.0,
            scheduled: 0,
        }
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn scheduled_count(&self) -> u64 {
        self.scheduled
    }

    pub fn queued_ahead(&self, now: f64) -> f64 {
        (self.cursor - now).max(0.0)
    }

    /// Decode `bytes` as 16-bit PCM and enqueue it. A decode failure leaves the
    /// cursor untouched.
    pub fn schedule(
        &mut self,
        output: &mut dyn AudioOutput,
        bytes: &[u8],
    ) -> Result<Scheduled, DecodeError> {
        let samples = decode_pcm16(bytes)?;
        let buffer_rate = self.sample_rate;
        let duration = samples.len() as f64 / f64::from(buffer_rate);
        let now = output.now();
        let start = now.max(self.cursor);
        output.enqueue(ScheduledBuffer {
            start,
            samples,
            sample_rate: buffer_rate,
        });
        self.cursor = start + duration;
        self.scheduled += 1;
        Ok(Scheduled {
            start,
            duration,
            queued_ahead: self.cursor - now,
        })
    }
}
