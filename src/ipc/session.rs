use crate::channel::WebSocketConnector;
use crate::config::AppConfig;
use crate::media::{list_input_devices, SystemDevices};
use crate::session::LiveController;
use crate::{log_debug, log_debug_content};
use anyhow::Result;
#[cfg(any(test, feature = "mutants"))]
use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::protocol::{IpcCommand, IpcEvent};
use super::router::{
    emit_status, forward_notices, handle_connect, handle_disconnect, handle_get_spectrum,
    handle_get_stats, handle_set_camera, handle_set_mic,
};

/// Longest wait for a command before the controller is pumped again.
const PUMP_INTERVAL: Duration = Duration::from_millis(5);
const HEARTBEAT_EVERY: u64 = 1000;

/// Everything the IPC loop owns: the frontend-facing identity plus the controller.
pub(super) struct IpcState {
    pub(super) config: AppConfig,
    pub(super) controller: LiveController,
    pub(super) input_devices: Vec<String>,
    /// Identifies this IPC process to the frontend; sessions carry their own ids.
    pub(super) session_id: String,
}

impl IpcState {
    pub(super) fn new(config: AppConfig) -> Self {
        let controller = LiveController::new(
            Box::new(SystemDevices::new()),
            Box::new(WebSocketConnector::new()),
            config.session_settings(),
            config.media_request(),
            config.channel_config(),
        );
        let input_devices = list_input_devices().unwrap_or_else(|err| {
            log_debug(&format!("no input devices to advertise: {err}"));
            Vec::new()
        });
        Self::with_controller(config, controller, input_devices)
    }

    pub(super) fn with_controller(
        config: AppConfig,
        controller: LiveController,
        input_devices: Vec<String>,
    ) -> Self {
        let started = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self {
            config,
            controller,
            input_devices,
            session_id: format!("ipc-{:x}-{started:x}", std::process::id()),
        }
    }

    pub(super) fn emit_capabilities(&self) {
        let channel = self.config.channel_config();
        send_event(&IpcEvent::Capabilities {
            session_id: self.session_id.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            mic_available: !self.input_devices.is_empty(),
            input_devices: self.input_devices.clone(),
            input_device: self.config.input_device.clone(),
            output_device: self.config.output_device.clone(),
            video_source: self.config.video_source.label().to_string(),
            model: channel.model,
            voice: channel.voice,
            api_key_configured: channel.api_key.is_some(),
            input_sample_rate: self.config.input_sample_rate,
            output_sample_rate: self.config.output_sample_rate,
            frequency_bins: self.config.fft_size / 2,
        });
    }
}

#[cfg(any(test, feature = "mutants"))]
thread_local! {
    /// When set, events emitted on this thread are collected instead of printed.
    static CAPTURED: RefCell<Option<Vec<IpcEvent>>> = const { RefCell::new(None) };
}

/// One JSON object per line on stdout.
pub(super) fn send_event(event: &IpcEvent) {
    #[cfg(any(test, feature = "mutants"))]
    {
        let captured = CAPTURED.with(|slot| match slot.borrow_mut().as_mut() {
            Some(events) => {
                events.push(event.clone());
                true
            }
            None => false,
        });
        if captured {
            return;
        }
    }
    let Ok(json) = serde_json::to_string(event) else {
        return;
    };
    let mut stdout = io::stdout().lock();
    if writeln!(stdout, "{json}").and_then(|()| stdout.flush()).is_err() {
        log_debug("stdout closed; dropping IPC event");
    }
}

/// Collect this thread's events from now on, discarding anything collected before.
#[cfg(any(test, feature = "mutants"))]
pub(super) fn start_capture() {
    CAPTURED.with(|slot| *slot.borrow_mut() = Some(Vec::new()));
}

/// Events collected since the last [`start_capture`] or [`take_captured`].
#[cfg(any(test, feature = "mutants"))]
pub(super) fn take_captured() -> Vec<IpcEvent> {
    CAPTURED.with(|slot| {
        slot.borrow_mut()
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    })
}

/// Blank lines are skipped and malformed ones answered with a recoverable error.
/// The thread ends with stdin or with the loop.
#[cfg_attr(any(test, feature = "mutants"), allow(dead_code))]
fn spawn_stdin_reader(commands: Sender<IpcCommand>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines().map_while(|line| line.ok()) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_command(line) {
                Ok(command) => {
                    if commands.send(command).is_err() {
                        break;
                    }
                }
                Err(rejection) => send_event(&rejection),
            }
        }
        log_debug("stdin closed; command reader done");
    })
}

pub(super) fn parse_command(line: &str) -> Result<IpcCommand, IpcEvent> {
    serde_json::from_str::<IpcCommand>(line).map_err(|e| IpcEvent::Error {
        message: format!("Invalid command: {e}"),
        recoverable: true,
    })
}

pub fn run_ipc_mode(config: AppConfig) -> Result<()> {
    log_debug("Starting JSON IPC mode");
    let mut state = IpcState::new(config);
    state.emit_capabilities();
    emit_status(&state);

    let (commands, inbox) = mpsc::channel();
    #[cfg(any(test, feature = "mutants"))]
    {
        drop(commands);
        run_ipc_loop(&mut state, &inbox, Some(10))
    }
    #[cfg(not(any(test, feature = "mutants")))]
    {
        let _reader = spawn_stdin_reader(commands);
        run_ipc_loop(&mut state, &inbox, None)
    }
}

#[cfg(any(test, feature = "mutants"))]
pub(super) fn ipc_guard_tripped(elapsed: Duration) -> bool {
    elapsed > Duration::from_secs(2)
}

pub(super) fn dispatch_command(state: &mut IpcState, cmd: IpcCommand) {
    log_debug_content(&format!("IPC command received: {cmd:?}"));
    match cmd {
        IpcCommand::Connect => handle_connect(state),
        IpcCommand::Disconnect => handle_disconnect(state),
        IpcCommand::SetMic { enabled } => handle_set_mic(state, enabled),
        IpcCommand::SetCamera { enabled } => handle_set_camera(state, enabled),
        IpcCommand::GetStatus => emit_status(state),
        IpcCommand::GetSpectrum { bars } => handle_get_spectrum(state, bars),
        IpcCommand::GetStats => handle_get_stats(state),
        IpcCommand::GetCapabilities => state.emit_capabilities(),
    }
}

/// Pump the controller, forward what it reported, then wait briefly for the next
/// command. A closed inbox ends the loop and the live session with it.
pub(super) fn run_ipc_loop(
    state: &mut IpcState,
    inbox: &Receiver<IpcCommand>,
    max_loops: Option<u64>,
) -> Result<()> {
    #[cfg(any(test, feature = "mutants"))]
    let guard_start = Instant::now();
    let mut turns: u64 = 0;
    while max_loops.map_or(true, |limit| turns < limit) {
        #[cfg(any(test, feature = "mutants"))]
        if ipc_guard_tripped(guard_start.elapsed()) {
            panic!("IPC loop guard exceeded");
        }
        turns += 1;
        if turns % HEARTBEAT_EVERY == 0 {
            log_debug(&format!(
                "IPC turn {turns}, status: {}",
                state.controller.status().label()
            ));
        }

        state.controller.pump(Instant::now());
        forward_notices(state);

        match inbox.recv_timeout(PUMP_INTERVAL) {
            Ok(cmd) => dispatch_command(state, cmd),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log_debug("command inbox closed");
                break;
            }
        }
    }

    state.controller.disconnect();
    forward_notices(state);
    log_debug(&format!("IPC mode exiting after {turns} turns"));
    Ok(())
}
