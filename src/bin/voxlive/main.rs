//! VoxLive entrypoint: interactive console session or JSON IPC for a UI shell.
//!
//! # Architecture
//!
//! - Input thread: reads stdin lines (keys in interactive mode, JSON in IPC mode)
//! - Main loop: pumps the live session every few milliseconds
//! - Device threads: own the microphone, speaker and camera streams
//! - Channel thread: owns the WebSocket to the live service

mod cli_utils;
mod interactive;

use anyhow::Result;
use clap::Parser;
use std::panic;
use std::sync::OnceLock;
use voxlive::config::AppConfig;
use voxlive::telemetry::init_tracing;
use voxlive::{init_logging, ipc, log_debug, log_debug_content, log_file_path, log_panic};

use crate::cli_utils::{list_input_devices, list_output_devices};

static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            log_panic(info);
            let location = info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()))
                .unwrap_or_else(|| "unknown".to_string());
            log_debug(&format!("panic at {location}"));
            log_debug_content(&format!("panic: {info}"));
            previous(info);
        }));
    });
}

fn main() -> Result<()> {
    install_panic_hook();
    let mut config = AppConfig::parse();

    if config.list_input_devices {
        print!("{}", list_input_devices()?);
        return Ok(());
    }
    if config.list_output_devices {
        print!("{}", list_output_devices()?);
        return Ok(());
    }

    config.validate()?;
    init_logging(&config);
    init_tracing(&config);
    let log_path = log_file_path();
    log_debug("=== VoxLive Started ===");
    log_debug(&format!("Log file: {log_path:?}"));

    if config.json_ipc {
        log_debug("Running in JSON IPC mode");
        return ipc::run_ipc_mode(config);
    }

    let result = interactive::run(config);
    log_debug("=== VoxLive Exiting ===");
    if let Err(ref e) = result {
        log_debug(&format!("Exit with error: {e:#}"));
    }
    result
}
