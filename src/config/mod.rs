//! Command-line parsing and validation helpers.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use clap::{Parser, ValueEnum};
use std::time::Duration;

pub use defaults::{
    default_video_source, DEFAULT_CAPTURE_BLOCK_SAMPLES, DEFAULT_CAPTURE_CHANNEL_CAPACITY,
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_DEVICE_TIMEOUT_MS, DEFAULT_ENDPOINT, DEFAULT_FFT_SIZE,
    DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, DEFAULT_INPUT_SAMPLE_RATE, DEFAULT_JPEG_QUALITY,
    DEFAULT_MODEL, DEFAULT_OUTPUT_SAMPLE_RATE, DEFAULT_SPECTRUM_SMOOTHING,
    DEFAULT_VIDEO_INTERVAL_MS, DEFAULT_VOICE, MAX_CAPTURE_BLOCK_SAMPLES,
    MIN_CAPTURE_BLOCK_SAMPLES,
};

/// CLI options for a live voice/video session.
#[derive(Debug, Parser, Clone)]
#[command(about = "VoxLive: live audio/video conversation engine", author, version)]
pub struct AppConfig {
    /// API key for the live endpoint
    #[arg(long = "api-key", env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// WebSocket endpoint of the live service
    #[arg(long, env = "VOXLIVE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Model name requested in the session setup
    #[arg(long, env = "VOXLIVE_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Prebuilt voice used for spoken responses
    #[arg(long, default_value = DEFAULT_VOICE)]
    pub voice: String,

    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Preferred audio output device name
    #[arg(long)]
    pub output_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Print detected audio output devices and exit
    #[arg(long = "list-output-devices", default_value_t = false)]
    pub list_output_devices: bool,

    /// Sample rate of outbound microphone PCM (Hz)
    #[arg(long = "input-sample-rate", default_value_t = DEFAULT_INPUT_SAMPLE_RATE)]
    pub input_sample_rate: u32,

    /// Sample rate of inbound model audio (Hz)
    #[arg(long = "output-sample-rate", default_value_t = DEFAULT_OUTPUT_SAMPLE_RATE)]
    pub output_sample_rate: u32,

    /// Samples per outbound audio chunk (power of two)
    #[arg(long = "capture-block-samples", default_value_t = DEFAULT_CAPTURE_BLOCK_SAMPLES)]
    pub capture_block_samples: usize,

    /// Frame channel capacity between the capture callback and the session loop
    #[arg(
        long = "capture-channel-capacity",
        default_value_t = DEFAULT_CAPTURE_CHANNEL_CAPACITY
    )]
    pub capture_channel_capacity: usize,

    /// Where video frames come from
    #[arg(long = "video-source", value_enum, default_value_t = default_video_source())]
    pub video_source: VideoSourceKind,

    /// Camera index used by the camera video source
    #[arg(long = "camera-index", default_value_t = 0)]
    pub camera_index: u32,

    /// Interval between sampled video frames (milliseconds)
    #[arg(long = "video-interval-ms", default_value_t = DEFAULT_VIDEO_INTERVAL_MS)]
    pub video_interval_ms: u64,

    /// JPEG quality for sampled frames (1-100)
    #[arg(long = "jpeg-quality", default_value_t = DEFAULT_JPEG_QUALITY)]
    pub jpeg_quality: u8,

    /// Frame width used before the camera reports its native size
    #[arg(long = "frame-width", default_value_t = DEFAULT_FRAME_WIDTH)]
    pub frame_width: u32,

    /// Frame height used before the camera reports its native size
    #[arg(long = "frame-height", default_value_t = DEFAULT_FRAME_HEIGHT)]
    pub frame_height: u32,

    /// Start sessions with the microphone muted
    #[arg(long = "start-muted", default_value_t = false)]
    pub start_muted: bool,

    /// Start sessions with the camera disabled
    #[arg(long = "camera-off", default_value_t = false)]
    pub camera_off: bool,

    /// Give up on the transport handshake after this long (milliseconds)
    #[arg(long = "connect-timeout-ms", default_value_t = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,

    /// Give up on opening an audio/video device after this long (milliseconds)
    #[arg(long = "device-timeout-ms", default_value_t = DEFAULT_DEVICE_TIMEOUT_MS)]
    pub device_timeout_ms: u64,

    /// FFT size of the output spectrum analyser (power of two)
    #[arg(long = "fft-size", default_value_t = DEFAULT_FFT_SIZE)]
    pub fft_size: usize,

    /// Temporal smoothing of the output spectrum (0.0-1.0)
    #[arg(long = "spectrum-smoothing", default_value_t = DEFAULT_SPECTRUM_SMOOTHING)]
    pub spectrum_smoothing: f32,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "VOXLIVE_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "VOXLIVE_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging device names and remote close reasons (debug log only)
    #[arg(
        long = "log-content",
        env = "VOXLIVE_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,

    /// Run in JSON IPC mode for external UI integration
    #[arg(long = "json-ipc")]
    pub json_ipc: bool,
}

/// Video sources selectable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VideoSourceKind {
    Camera,
    TestPattern,
}

impl VideoSourceKind {
    pub fn label(self) -> &'static str {
        match self {
            VideoSourceKind::Camera => "camera",
            VideoSourceKind::TestPattern => "test-pattern",
        }
    }
}

/// Clock rates, block sizes and timers for one live session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub capture_block_samples: usize,
    pub capture_channel_capacity: usize,
    pub video_interval: Duration,
    pub jpeg_quality: u8,
    pub default_frame_width: u32,
    pub default_frame_height: u32,
    pub fft_size: usize,
    pub spectrum_smoothing: f32,
    pub mic_enabled: bool,
    pub camera_enabled: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            input_sample_rate: DEFAULT_INPUT_SAMPLE_RATE,
            output_sample_rate: DEFAULT_OUTPUT_SAMPLE_RATE,
            capture_block_samples: DEFAULT_CAPTURE_BLOCK_SAMPLES,
            capture_channel_capacity: DEFAULT_CAPTURE_CHANNEL_CAPACITY,
            video_interval: Duration::from_millis(DEFAULT_VIDEO_INTERVAL_MS),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            default_frame_width: DEFAULT_FRAME_WIDTH,
            default_frame_height: DEFAULT_FRAME_HEIGHT,
            fft_size: DEFAULT_FFT_SIZE,
            spectrum_smoothing: DEFAULT_SPECTRUM_SMOOTHING,
            mic_enabled: true,
            camera_enabled: true,
        }
    }
}

/// Everything the transport needs to open one channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    pub input_sample_rate: u32,
    pub connect_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            input_sample_rate: DEFAULT_INPUT_SAMPLE_RATE,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

/// Which capture and playback devices a session asks for.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub video_source: VideoSourceKind,
    pub camera_index: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub device_timeout: Duration,
}

impl Default for MediaRequest {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            video_source: default_video_source(),
            camera_index: 0,
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            device_timeout: Duration::from_millis(DEFAULT_DEVICE_TIMEOUT_MS),
        }
    }
}
