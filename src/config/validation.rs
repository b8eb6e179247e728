use super::defaults::{
    MAX_CAPTURE_BLOCK_SAMPLES, MAX_FRAME_DIMENSION, MAX_SAMPLE_RATE, MIN_CAPTURE_BLOCK_SAMPLES,
    MIN_SAMPLE_RATE,
};
use super::{AppConfig, ChannelConfig, MediaRequest, SessionSettings};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::time::Duration;
use url::Url;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize free-form strings.
    pub fn validate(&mut self) -> Result<()> {
        for (flag, rate) in [
            ("--input-sample-rate", self.input_sample_rate),
            ("--output-sample-rate", self.output_sample_rate),
        ] {
            if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
                bail!(
                    "{flag} must be between {MIN_SAMPLE_RATE} and {MAX_SAMPLE_RATE} Hz, got {rate}"
                );
            }
        }

        if !self.capture_block_samples.is_power_of_two()
            || !(MIN_CAPTURE_BLOCK_SAMPLES..=MAX_CAPTURE_BLOCK_SAMPLES)
                .contains(&self.capture_block_samples)
        {
            bail!(
                "--capture-block-samples must be a power of two between {MIN_CAPTURE_BLOCK_SAMPLES} and {MAX_CAPTURE_BLOCK_SAMPLES}, got {}",
                self.capture_block_samples
            );
        }
        if !(1..=1024).contains(&self.capture_channel_capacity) {
            bail!(
                "--capture-channel-capacity must be between 1 and 1024, got {}",
                self.capture_channel_capacity
            );
        }

        if !(100..=60_000).contains(&self.video_interval_ms) {
            bail!(
                "--video-interval-ms must be between 100 and 60000, got {}",
                self.video_interval_ms
            );
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!(
                "--jpeg-quality must be between 1 and 100, got {}",
                self.jpeg_quality
            );
        }
        for (flag, value) in [
            ("--frame-width", self.frame_width),
            ("--frame-height", self.frame_height),
        ] {
            if !(16..=MAX_FRAME_DIMENSION).contains(&value) {
                bail!("{flag} must be between 16 and {MAX_FRAME_DIMENSION}, got {value}");
            }
        }

        if !(100..=120_000).contains(&self.connect_timeout_ms) {
            bail!(
                "--connect-timeout-ms must be between 100 and 120000, got {}",
                self.connect_timeout_ms
            );
        }
        if !(100..=60_000).contains(&self.device_timeout_ms) {
            bail!(
                "--device-timeout-ms must be between 100 and 60000, got {}",
                self.device_timeout_ms
            );
        }

        if !self.fft_size.is_power_of_two() || !(32..=32_768).contains(&self.fft_size) {
            bail!(
                "--fft-size must be a power of two between 32 and 32768, got {}",
                self.fft_size
            );
        }
        if !(0.0..=1.0).contains(&self.spectrum_smoothing) {
            bail!(
                "--spectrum-smoothing must be between 0.0 and 1.0, got {}",
                self.spectrum_smoothing
            );
        }

        #[cfg(not(feature = "camera"))]
        if matches!(self.video_source, super::VideoSourceKind::Camera) {
            bail!("--video-source camera requires building with the 'camera' feature");
        }

        self.model = sanitize_token(&self.model, "--model", &['-', '_', '.', '/'])?;
        self.voice = sanitize_token(&self.voice, "--voice", &['-', '_'])?;
        self.endpoint = validate_endpoint(&self.endpoint)?;

        // Treat a blank key from the environment as missing.
        if let Some(key) = &self.api_key {
            let trimmed = key.trim();
            self.api_key = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        }

        for (flag, device) in [
            ("--input-device", &self.input_device),
            ("--output-device", &self.output_device),
        ] {
            if let Some(name) = device {
                if name.len() > 256 || name.chars().any(char::is_control) {
                    bail!("{flag} must be <=256 characters with no control characters");
                }
            }
        }

        Ok(())
    }

    /// Snapshot clock rates and timers for the session engine.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            input_sample_rate: self.input_sample_rate,
            output_sample_rate: self.output_sample_rate,
            capture_block_samples: self.capture_block_samples,
            capture_channel_capacity: self.capture_channel_capacity,
            video_interval: Duration::from_millis(self.video_interval_ms),
            jpeg_quality: self.jpeg_quality,
            default_frame_width: self.frame_width,
            default_frame_height: self.frame_height,
            fft_size: self.fft_size,
            spectrum_smoothing: self.spectrum_smoothing,
            mic_enabled: !self.start_muted,
            camera_enabled: !self.camera_off,
        }
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            voice: self.voice.clone(),
            input_sample_rate: self.input_sample_rate,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    pub fn media_request(&self) -> MediaRequest {
        MediaRequest {
            input_device: self.input_device.clone(),
            output_device: self.output_device.clone(),
            video_source: self.video_source,
            camera_index: self.camera_index,
            frame_width: self.frame_width,
            frame_height: self.frame_height,
            device_timeout: Duration::from_millis(self.device_timeout_ms),
        }
    }
}

/// Allow ASCII alphanumerics plus a short list of separators.
pub(super) fn sanitize_token(value: &str, flag: &str, separators: &[char]) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} cannot be empty");
    }
    if trimmed.len() > 128 {
        bail!("{flag} must be at most 128 characters");
    }
    if !trimmed
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || separators.contains(&ch))
    {
        bail!("{flag} may only contain letters, digits and {separators:?}");
    }
    Ok(trimmed.to_string())
}

/// Endpoints must be ws:// or wss:// URLs without an embedded key.
pub(super) fn validate_endpoint(value: &str) -> Result<String> {
    let trimmed = value.trim();
    let url = Url::parse(trimmed).with_context(|| format!("--endpoint '{trimmed}' is not a URL"))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        bail!("--endpoint must use ws:// or wss://, got '{}'", url.scheme());
    }
    if url.host_str().is_none() {
        bail!("--endpoint must include a host");
    }
    if url.query_pairs().any(|(name, _)| name == "key") {
        bail!("--endpoint must not embed the API key; use --api-key or GEMINI_API_KEY");
    }
    Ok(trimmed.to_string())
}
