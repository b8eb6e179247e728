use super::defaults::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
use super::validation::{sanitize_token, validate_endpoint};
use super::{default_video_source, AppConfig, VideoSourceKind};
use clap::Parser;
use std::time::Duration;

fn parse(args: &[&str]) -> AppConfig {
    let mut argv = vec!["test-app"];
    argv.extend_from_slice(args);
    AppConfig::parse_from(argv)
}

#[test]
fn defaults_validate() {
    let mut cfg = parse(&[]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.input_sample_rate, 16_000);
    assert_eq!(cfg.output_sample_rate, 24_000);
    assert_eq!(cfg.capture_block_samples, 4096);
    assert_eq!(cfg.video_interval_ms, 1000);
    assert_eq!(cfg.jpeg_quality, 50);
    assert_eq!(cfg.video_source, default_video_source());
}

#[test]
fn rejects_sample_rates_out_of_bounds() {
    let low = (MIN_SAMPLE_RATE - 1).to_string();
    let high = (MAX_SAMPLE_RATE + 1).to_string();
    let mut cfg = parse(&["--input-sample-rate", &low]);
    assert!(cfg.validate().is_err());
    let mut cfg = parse(&["--output-sample-rate", &high]);
    assert!(cfg.validate().is_err());
    let mut cfg = parse(&["--output-sample-rate", "48000"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_block_sizes_that_are_not_powers_of_two() {
    let mut cfg = parse(&["--capture-block-samples", "4000"]);
    assert!(cfg.validate().is_err());
    let mut cfg = parse(&["--capture-block-samples", "128"]);
    assert!(cfg.validate().is_err());
    let mut cfg = parse(&["--capture-block-samples", "2048"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_jpeg_quality_bounds() {
    let mut cfg = parse(&["--jpeg-quality", "0"]);
    assert!(cfg.validate().is_err());
    let mut cfg = parse(&["--jpeg-quality", "101"]);
    assert!(cfg.validate().is_err());
    let mut cfg = parse(&["--jpeg-quality", "100"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_video_interval_bounds() {
    let mut cfg = parse(&["--video-interval-ms", "50"]);
    assert!(cfg.validate().is_err());
    let mut cfg = parse(&["--video-interval-ms", "60001"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_spectrum_settings_out_of_range() {
    let mut cfg = parse(&["--fft-size", "300"]);
    assert!(cfg.validate().is_err());
    let mut cfg = parse(&["--spectrum-smoothing", "1.5"]);
    assert!(cfg.validate().is_err());
    let mut cfg = parse(&["--fft-size", "512", "--spectrum-smoothing", "0.8"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_timeouts_out_of_range() {
    let mut cfg = parse(&["--connect-timeout-ms", "10"]);
    assert!(cfg.validate().is_err());
    let mut cfg = parse(&["--device-timeout-ms", "0"]);
    assert!(cfg.validate().is_err());
}

#[cfg(not(feature = "camera"))]
#[test]
fn camera_source_requires_feature() {
    let mut cfg = parse(&["--video-source", "camera"]);
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("camera"));
}

#[test]
fn test_pattern_source_always_validates() {
    let mut cfg = parse(&["--video-source", "test-pattern"]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.video_source.label(), "test-pattern");
}

#[test]
fn blank_api_key_is_treated_as_missing() {
    let mut cfg = parse(&["--api-key", "   "]);
    cfg.validate().expect("blank key is allowed");
    assert!(cfg.api_key.is_none());

    let mut cfg = parse(&["--api-key", " secret "]);
    cfg.validate().expect("key validates");
    assert_eq!(cfg.api_key.as_deref(), Some("secret"));
}

#[test]
fn endpoint_must_be_websocket_url() {
    assert!(validate_endpoint("https://example.com/live").is_err());
    assert!(validate_endpoint("not a url").is_err());
    assert!(validate_endpoint("wss://example.com/live?key=abc").is_err());
    assert_eq!(
        validate_endpoint(" ws://127.0.0.1:9000/live ").unwrap(),
        "ws://127.0.0.1:9000/live"
    );
}

#[test]
fn model_and_voice_are_sanitized() {
    assert_eq!(
        sanitize_token(" gemini-2.5-flash ", "--model", &['-', '.']).unwrap(),
        "gemini-2.5-flash"
    );
    assert!(sanitize_token("", "--voice", &['-']).is_err());
    assert!(sanitize_token("Zephyr;rm", "--voice", &['-']).is_err());

    let mut cfg = parse(&["--voice", "Puck"]);
    assert!(cfg.validate().is_ok());
    let mut cfg = parse(&["--model", "bad model"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_device_names_with_control_characters() {
    let mut cfg = parse(&["--input-device", "mic\nname"]);
    assert!(cfg.validate().is_err());
    let mut cfg = parse(&["--output-device", "Speakers"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn derived_settings_follow_flags() {
    let mut cfg = parse(&[
        "--start-muted",
        "--camera-off",
        "--video-interval-ms",
        "500",
        "--connect-timeout-ms",
        "2500",
        "--video-source",
        "test-pattern",
        "--camera-index",
        "2",
    ]);
    cfg.validate().expect("valid config");

    let settings = cfg.session_settings();
    assert!(!settings.mic_enabled);
    assert!(!settings.camera_enabled);
    assert_eq!(settings.video_interval, Duration::from_millis(500));
    assert_eq!(settings.capture_block_samples, 4096);

    let channel = cfg.channel_config();
    assert_eq!(channel.connect_timeout, Duration::from_millis(2500));
    assert_eq!(channel.input_sample_rate, 16_000);

    let media = cfg.media_request();
    assert_eq!(media.video_source, VideoSourceKind::TestPattern);
    assert_eq!(media.camera_index, 2);
    assert_eq!((media.frame_width, media.frame_height), (640, 480));
}
