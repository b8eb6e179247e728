//! Sample-accurate timeline behind the output clock.
//!
//! The clock is the number of frames rendered so far, so it only advances when
//! the device pulls audio. Buffers are placed on absolute frame positions and
//! summed where they overlap.

use super::analyser::FrequencyTap;
use super::playback::ScheduledBuffer;
use std::collections::VecDeque;

#[derive(Debug)]
struct Voice {
    start_frame: u64,
    samples: Vec<f32>,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

#[derive(Debug)]
pub struct Mixer {
    sample_rate: u32,
    position: u64,
    voices: VecDeque<Voice>,
    tap: FrequencyTap,
}

impl Mixer {
    pub fn new(sample_rate: u32, tap: FrequencyTap) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            position: 0,
            voices: VecDeque::new(),
            tap,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn now(&self) -> f64 {
        self.position as f64 / f64::from(self.sample_rate)
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Frames still queued beyond the current position.
    pub fn pending_frames(&self) -> u64 {
        self.voices
            .iter()
            .map(Voice::end_frame)
            .max()
            .map(|end| end.saturating_sub(self.position))
            .unwrap_or(0)
    }

    pub fn add(&mut self, buffer: ScheduledBuffer) {
        if buffer.samples.is_empty() {
            return;
        }
        let requested = (buffer.start * f64::from(self.sample_rate)).round().max(0.0) as u64;
        // A buffer that arrives after its slot plays late rather than truncated.
        let start_frame = requested.max(self.position);
        let index = self
            .voices
            .partition_point(|voice| voice.start_frame <= start_frame);
        self.voices.insert(
            index,
            Voice {
                start_frame,
                samples: buffer.samples,
            },
        );
    }

    /// Render the next `out.len()` frames and advance the clock.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let begin = self.position;
        let end = begin + out.len() as u64;
        for voice in self.voices.iter() {
            if voice.start_frame >= end {
                break;
            }
            let voice_end = voice.end_frame();
            if voice_end <= begin {
                continue;
            }
            let from = voice.start_frame.max(begin);
            let to = voice_end.min(end);
            for frame in from..to {
                out[(frame - begin) as usize] += voice.samples[(frame - voice.start_frame) as usize];
            }
        }
        self.voices.retain(|voice| voice.end_frame() > end);
        self.position = end;
        self.tap.push(out);
    }
}
