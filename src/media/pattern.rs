//! Synthetic video source for machines without a camera.

use super::{MediaTrack, RgbFrame, TrackKind, VideoTrack};
use crate::error::ResourceReleaseError;

/// Diagonal colour bars that shift one step per frame so the remote side can
/// tell frames apart.
pub struct TestPatternTrack {
    width: u32,
    height: u32,
    enabled: bool,
    live: bool,
    frame_index: u32,
}

impl TestPatternTrack {
    pub fn new(width: u32, height: u32, enabled: bool) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            enabled,
            live: true,
            frame_index: 0,
        }
    }

    fn render(&self) -> RgbFrame {
        let mut frame = RgbFrame::black(self.width, self.height);
        let shift = self.frame_index.wrapping_mul(4);
        for (index, pixel) in frame.pixels.chunks_exact_mut(3).enumerate() {
            let x = index as u32 % self.width;
            let y = index as u32 / self.width;
            let band = (x + y + shift) / 32 % 6;
            let (r, g, b) = match band {
                0 => (255, 64, 64),
                1 => (255, 200, 64),
                2 => (64, 200, 96),
                3 => (64, 200, 255),
                4 => (96, 96, 255),
                _ => (200, 96, 255),
            };
            pixel.copy_from_slice(&[r, g, b]);
        }
        frame
    }
}

impl MediaTrack for TestPatternTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn label(&self) -> String {
        "test pattern".to_string()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn stop(&mut self) -> Result<(), ResourceReleaseError> {
        if !self.live {
            return Err(ResourceReleaseError::AlreadyReleased("test pattern track"));
        }
        self.live = false;
        Ok(())
    }
}

impl VideoTrack for TestPatternTrack {
    fn native_size(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn current_frame(&mut self) -> Option<RgbFrame> {
        if !self.live {
            return None;
        }
        let frame = self.render();
        self.frame_index = self.frame_index.wrapping_add(1);
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_have_requested_size_and_change() {
        let mut track = TestPatternTrack::new(64, 48, true);
        let first = track.current_frame().unwrap();
        let second = track.current_frame().unwrap();
        assert!(first.is_valid());
        assert_eq!((first.width, first.height), (64, 48));
        assert_ne!(first.pixels, second.pixels);
    }

    #[test]
    fn stopped_track_yields_nothing() {
        let mut track = TestPatternTrack::new(16, 16, true);
        track.stop().unwrap();
        assert!(!track.is_live());
        assert!(track.current_frame().is_none());
        assert_eq!(
            track.stop(),
            Err(ResourceReleaseError::AlreadyReleased("test pattern track"))
        );
    }
}
