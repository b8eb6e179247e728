use anyhow::Result;
use std::env;
use std::time::Duration;
use voxlive::audio::list_output_devices as output_devices;
use voxlive::media::list_input_devices as input_devices;
use voxlive::session::SessionStats;

/// Comma-separated device names that replace real enumeration (tests, CI).
const TEST_DEVICES_ENV: &str = "VOXLIVE_TEST_DEVICES";

fn test_devices() -> Option<Vec<String>> {
    let raw = env::var(TEST_DEVICES_ENV).ok()?;
    Some(
        raw.trim()
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

fn render_device_list(kind: &str, devices: Vec<String>) -> String {
    let mut output = String::new();
    if devices.is_empty() {
        output.push_str(&format!("No audio {kind} devices detected.\n"));
    } else {
        output.push_str(&format!("Available audio {kind} devices:\n"));
        for name in devices {
            output.push_str(&format!("  - {name}\n"));
        }
    }
    output
}

pub(crate) fn list_input_devices() -> Result<String> {
    let devices = match test_devices() {
        Some(devices) => devices,
        None => input_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio input devices: {err}");
            Vec::new()
        }),
    };
    Ok(render_device_list("input", devices))
}

pub(crate) fn list_output_devices() -> Result<String> {
    let devices = match test_devices() {
        Some(devices) => devices,
        None => output_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio output devices: {err}");
            Vec::new()
        }),
    };
    Ok(render_device_list("output", devices))
}

/// Summary printed when an interactive run ends; empty when nothing was exchanged.
pub(crate) fn format_session_stats(stats: &SessionStats, elapsed: Duration) -> String {
    if stats.audio_chunks_sent == 0
        && stats.video_chunks_sent == 0
        && stats.audio_chunks_scheduled == 0
    {
        return String::new();
    }
    let mut lines = vec![
        String::new(),
        "Session summary".to_string(),
        "───────────────".to_string(),
        format!("  Duration:         {:.1}s", elapsed.as_secs_f32()),
        format!("  Audio chunks out: {}", stats.audio_chunks_sent),
        format!("  Video frames out: {}", stats.video_chunks_sent),
        format!("  Audio chunks in:  {}", stats.audio_chunks_scheduled),
    ];
    if stats.decode_errors > 0 {
        lines.push(format!("  Decode errors:    {}", stats.decode_errors));
    }
    if stats.dropped_capture_frames > 0 || stats.dropped_inbound > 0 {
        lines.push(format!(
            "  Dropped:          {} capture, {} inbound",
            stats.dropped_capture_frames, stats.dropped_inbound
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn with_test_devices(value: Option<&str>, action: impl FnOnce() -> Result<String>) -> String {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let previous = env::var(TEST_DEVICES_ENV).ok();
        if let Some(value) = value {
            env::set_var(TEST_DEVICES_ENV, value);
        } else {
            env::remove_var(TEST_DEVICES_ENV);
        }

        let output = action().expect("action should succeed");

        if let Some(previous) = previous {
            env::set_var(TEST_DEVICES_ENV, previous);
        } else {
            env::remove_var(TEST_DEVICES_ENV);
        }
        output
    }

    #[test]
    fn list_input_devices_outputs_devices() {
        let output = with_test_devices(Some("Mic A, Mic B"), list_input_devices);
        assert!(output.contains("Available audio input devices:"));
        assert!(output.contains("  - Mic A"));
        assert!(output.contains("  - Mic B"));
    }

    #[test]
    fn list_output_devices_outputs_empty_message() {
        let output = with_test_devices(Some(" "), list_output_devices);
        assert_eq!(output, "No audio output devices detected.\n");
    }

    #[test]
    fn stats_summary_empty_without_traffic() {
        assert!(format_session_stats(&SessionStats::default(), Duration::from_secs(3)).is_empty());
    }

    #[test]
    fn stats_summary_lists_counters() {
        let stats = SessionStats {
            audio_chunks_sent: 12,
            video_chunks_sent: 3,
            audio_chunks_scheduled: 5,
            decode_errors: 1,
            ..SessionStats::default()
        };
        let output = format_session_stats(&stats, Duration::from_millis(2500));
        assert!(output.contains("Duration:         2.5s"));
        assert!(output.contains("Audio chunks out: 12"));
        assert!(output.contains("Video frames out: 3"));
        assert!(output.contains("Decode errors:    1"));
        assert!(!output.contains("Dropped"));
    }
}
