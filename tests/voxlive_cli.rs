use std::process::{Command, Stdio};

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn voxlive_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_voxlive").expect("voxlive test binary not built")
}

#[test]
fn voxlive_help_mentions_name() {
    let output = Command::new(voxlive_bin())
        .arg("--help")
        .output()
        .expect("run voxlive --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("VoxLive"));
    assert!(combined.contains("--json-ipc"));
}

#[test]
fn voxlive_list_input_devices_uses_override() {
    let output = Command::new(voxlive_bin())
        .arg("--list-input-devices")
        .env("VOXLIVE_TEST_DEVICES", "Desk Mic,Headset")
        .output()
        .expect("run voxlive --list-input-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Available audio input devices:"));
    assert!(combined.contains("Desk Mic"));
    assert!(combined.contains("Headset"));
}

#[test]
fn voxlive_list_output_devices_prints_message() {
    let output = Command::new(voxlive_bin())
        .arg("--list-output-devices")
        .env_remove("VOXLIVE_TEST_DEVICES")
        .output()
        .expect("run voxlive --list-output-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(
        combined.contains("audio output devices")
            || combined.contains("Failed to list audio output devices")
    );
}

#[test]
fn voxlive_rejects_invalid_sample_rate() {
    let output = Command::new(voxlive_bin())
        .args(["--input-sample-rate", "12", "--json-ipc", "--no-logs"])
        .stdin(Stdio::null())
        .output()
        .expect("run voxlive with bad sample rate");
    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("--input-sample-rate"));
}

#[test]
fn voxlive_json_ipc_emits_capabilities_and_exits_on_eof() {
    let output = Command::new(voxlive_bin())
        .args(["--json-ipc", "--no-logs"])
        .env_remove("GEMINI_API_KEY")
        .env("VOXLIVE_TEST_DEVICES", "")
        .stdin(Stdio::null())
        .output()
        .expect("run voxlive --json-ipc");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next().expect("capabilities line");
    let event: serde_json::Value = serde_json::from_str(first).expect("json event");
    assert_eq!(event["event"], "capabilities");
    assert_eq!(event["api_key_configured"], false);
    assert!(stdout.contains(r#""status":"offline""#));
}
