use super::VideoSourceKind;

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
pub const DEFAULT_VOICE: &str = "Zephyr";

pub const DEFAULT_INPUT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_OUTPUT_SAMPLE_RATE: u32 = 24_000;
pub const DEFAULT_CAPTURE_BLOCK_SAMPLES: usize = 4096;
pub const MIN_CAPTURE_BLOCK_SAMPLES: usize = 256;
pub const MAX_CAPTURE_BLOCK_SAMPLES: usize = 16_384;
pub const DEFAULT_CAPTURE_CHANNEL_CAPACITY: usize = 32;

pub const DEFAULT_VIDEO_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_JPEG_QUALITY: u8 = 50;
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;
pub const MAX_FRAME_DIMENSION: u32 = 4096;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_DEVICE_TIMEOUT_MS: u64 = 3_000;

pub const DEFAULT_FFT_SIZE: usize = 256;
pub const DEFAULT_SPECTRUM_SMOOTHING: f32 = 0.5;

pub(super) const MIN_SAMPLE_RATE: u32 = 8_000;
pub(super) const MAX_SAMPLE_RATE: u32 = 48_000;

pub fn default_video_source() -> VideoSourceKind {
    if cfg!(feature = "camera") {
        VideoSourceKind::Camera
    } else {
        VideoSourceKind::TestPattern
    }
}
