//! Audio plumbing for a live session.
//!
//! Outbound: device frames are downmixed, cut into blocks, resampled onto the
//! input clock and encoded as 16-bit PCM. Inbound: PCM chunks are decoded and
//! scheduled back-to-back on the output clock, rendered by a mixer that also
//! feeds the spectrum tap.

mod analyser;
mod capture;
pub(crate) mod device_thread;
pub(crate) mod dispatch;
mod meter;
mod mixer;
pub mod pcm;
mod playback;
mod resample;
mod speaker;

pub use analyser::{
    ring_levels, FrequencyTap, RingLevels, SpectrumAnalyser, DEFAULT_MAX_DECIBELS,
    DEFAULT_MIN_DECIBELS,
};
pub use capture::{CaptureNode, InputContext};
pub use meter::{LiveMeter, METER_FLOOR_DB};
pub use mixer::Mixer;
pub use playback::{AudioOutput, PlaybackScheduler, Scheduled, ScheduledBuffer};
pub use speaker::{list_output_devices, SpeakerOutput};
