//! Mid-session mic and camera switches.
//!
//! These flip the enable flag on the live tracks and nothing else. The capture
//! stream, the capture node and the video timer keep running untouched.

use super::lifecycle::Session;
use super::state::SessionState;
use crate::log_debug;

impl Session {
    /// Returns whether the change applied. Only an Active session has tracks to switch.
    pub fn set_mic_enabled(&mut self, enabled: bool) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        stream.audio_mut().set_enabled(enabled);
        self.settings.mic_enabled = enabled;
        if !enabled {
            self.meter.reset();
        }
        log_debug(&format!("session {} mic enabled={enabled}", self.id));
        true
    }

    pub fn set_camera_enabled(&mut self, enabled: bool) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        stream.video_mut().set_enabled(enabled);
        self.settings.camera_enabled = enabled;
        log_debug(&format!("session {} camera enabled={enabled}", self.id));
        true
    }
}
