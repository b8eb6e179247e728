//! Periodic video sampling.
//!
//! The sampler is a deadline, not a thread: the session loop calls [`VideoSampler::poll`]
//! and at most one frame is taken per call. Missed periods are skipped rather than
//! replayed, so a stalled loop never produces a burst of stale frames.

use crate::channel::MediaChunk;
use crate::error::ResourceReleaseError;
use crate::log_debug;
use crate::media::{RgbFrame, VideoTrack};
use anyhow::{anyhow, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use std::time::{Duration, Instant};

/// Encode packed RGB pixels as baseline JPEG.
pub fn encode_jpeg(frame: &RgbFrame, quality: u8) -> Result<Vec<u8>> {
    let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
        .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    DynamicImage::ImageRgb8(image).write_with_encoder(encoder)?;
    Ok(out)
}

pub struct VideoSampler {
    interval: Duration,
    quality: u8,
    default_width: u32,
    default_height: u32,
    next_due: Option<Instant>,
    ticks: u64,
}

impl VideoSampler {
    pub fn new(interval: Duration, quality: u8, default_width: u32, default_height: u32) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            quality,
            default_width,
            default_height,
            next_due: None,
            ticks: 0,
        }
    }

    /// First firing is one interval after `now`.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    pub fn stop(&mut self) -> Result<(), ResourceReleaseError> {
        match self.next_due.take() {
            Some(_) => Ok(()),
            None => Err(ResourceReleaseError::AlreadyReleased("video timer")),
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Fire if due. A disabled track still consumes the tick but emits nothing.
    pub fn poll(&mut self, now: Instant, track: &mut dyn VideoTrack) -> Option<MediaChunk> {
        let due = self.next_due?;
        if now < due {
            return None;
        }
        let behind = now.duration_since(due);
        let skipped = (behind.as_nanos() / self.interval.as_nanos().max(1)) as u32;
        self.next_due = Some(due + self.interval * (skipped + 1));
        self.ticks += 1;

        if !track.is_enabled() || !track.is_live() {
            return None;
        }
        let frame = match track.current_frame() {
            Some(frame) if frame.is_valid() => frame,
            _ => RgbFrame::black(self.default_width, self.default_height),
        };
        match encode_jpeg(&frame, self.quality) {
            Ok(bytes) => Some(MediaChunk::video(bytes, now)),
            Err(err) => {
                log_debug(&format!("video frame encode failed: {err:#}"));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaTrack, TestPatternTrack};

    fn sampler() -> VideoSampler {
        VideoSampler::new(Duration::from_secs(1), 50, 32, 24)
    }

    #[test]
    fn jpeg_output_has_soi_marker() {
        let bytes = encode_jpeg(&RgbFrame::black(16, 16), 50).unwrap();
        assert_eq!(&bytes[..2], &[0xff, 0xd8]);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let frame = RgbFrame {
            width: 4,
            height: 4,
            pixels: vec![0; 5],
        };
        assert!(encode_jpeg(&frame, 50).is_err());
    }

    #[test]
    fn five_firings_over_five_seconds_give_five_chunks() {
        let mut sampler = sampler();
        let mut track = TestPatternTrack::new(32, 24, true);
        let start = Instant::now();
        sampler.start(start);
        let mut chunks = 0;
        for step in 1..=50u64 {
            let now = start + Duration::from_millis(step * 100);
            if sampler.poll(now, &mut track).is_some() {
                chunks += 1;
            }
        }
        assert_eq!(chunks, 5);
        assert_eq!(sampler.ticks(), 5);
    }

    #[test]
    fn late_poll_does_not_burst() {
        let mut sampler = sampler();
        let mut track = TestPatternTrack::new(32, 24, true);
        let start = Instant::now();
        sampler.start(start);
        let late = start + Duration::from_millis(4_500);
        assert!(sampler.poll(late, &mut track).is_some());
        assert!(sampler.poll(late, &mut track).is_none());
        assert!(sampler
            .poll(start + Duration::from_millis(4_900), &mut track)
            .is_none());
        assert!(sampler
            .poll(start + Duration::from_millis(5_000), &mut track)
            .is_some());
    }

    #[test]
    fn disabled_track_ticks_without_chunks() {
        let mut sampler = sampler();
        let mut track = TestPatternTrack::new(32, 24, false);
        let start = Instant::now();
        sampler.start(start);
        assert!(sampler
            .poll(start + Duration::from_secs(1), &mut track)
            .is_none());
        assert_eq!(sampler.ticks(), 1);
        track.set_enabled(true);
        assert!(sampler
            .poll(start + Duration::from_secs(2), &mut track)
            .is_some());
    }

    #[test]
    fn stop_is_reported_once() {
        let mut sampler = sampler();
        sampler.start(Instant::now());
        assert!(sampler.stop().is_ok());
        assert!(!sampler.is_running());
        assert_eq!(
            sampler.stop(),
            Err(ResourceReleaseError::AlreadyReleased("video timer"))
        );
        let mut track = TestPatternTrack::new(8, 8, true);
        assert!(sampler.poll(Instant::now(), &mut track).is_none());
    }
}
