//! Console front end: single-key commands on stdin, a one-line level readout on stdout.

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::{Duration, Instant};
use voxlive::channel::WebSocketConnector;
use voxlive::config::AppConfig;
use voxlive::media::SystemDevices;
use voxlive::{log_debug, ConnectionStatus, LiveController, SessionNotice};

use crate::cli_utils::format_session_stats;

/// Max pending input lines before backpressure.
const INPUT_CHANNEL_CAPACITY: usize = 64;
const LOOP_SLEEP: Duration = Duration::from_millis(5);
const LEVEL_UPDATE: Duration = Duration::from_millis(120);
const LEVEL_BARS: usize = 16;
const BAR_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    ToggleMic,
    ToggleCamera,
    Stats,
    Reconnect,
    Disconnect,
    Quit,
    Help,
}

fn parse_key(line: &str) -> Option<Key> {
    match line.trim().to_ascii_lowercase().as_str() {
        "m" | "mic" => Some(Key::ToggleMic),
        "c" | "cam" | "camera" => Some(Key::ToggleCamera),
        "s" | "stats" => Some(Key::Stats),
        "r" | "connect" => Some(Key::Reconnect),
        "d" | "disconnect" => Some(Key::Disconnect),
        "q" | "quit" | "exit" => Some(Key::Quit),
        "h" | "?" | "help" => Some(Key::Help),
        _ => None,
    }
}

fn print_help() {
    println!("Keys (press Enter after each):");
    println!("  m  toggle microphone    c  toggle camera");
    println!("  s  show stats           r  reconnect");
    println!("  d  disconnect           q  quit");
}

fn spawn_input_thread() -> Receiver<String> {
    let (tx, rx) = bounded(INPUT_CHANNEL_CAPACITY);
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
        log_debug("interactive input thread exiting");
    });
    rx
}

/// Render the ring bars as a compact glyph strip.
fn level_strip(bars: &[f32]) -> String {
    bars.iter()
        .map(|level| {
            let index = (level.clamp(0.0, 1.0) * (BAR_GLYPHS.len() - 1) as f32).round() as usize;
            BAR_GLYPHS[index.min(BAR_GLYPHS.len() - 1)]
        })
        .collect()
}

fn clear_level_line() {
    print!("\r\x1b[2K");
    let _ = io::stdout().flush();
}

struct Console {
    controller: LiveController,
    live_since: Option<Instant>,
    last_level_update: Instant,
}

impl Console {
    fn print_notices(&mut self) {
        for notice in self.controller.drain_notices() {
            clear_level_line();
            match notice {
                SessionNotice::Status { status, session_id } => {
                    match session_id {
                        Some(id) => println!("[{}] session {id}", status.label()),
                        None => println!("[{}]", status.label()),
                    }
                    match status {
                        ConnectionStatus::Live => self.live_since = Some(Instant::now()),
                        ConnectionStatus::Offline => self.print_summary(),
                        ConnectionStatus::Connecting => {}
                    }
                }
                SessionNotice::Error {
                    message,
                    recoverable,
                } => {
                    eprintln!("error: {message}");
                    if recoverable {
                        eprintln!("press r to try again");
                    }
                }
            }
        }
    }

    fn print_summary(&mut self) {
        let elapsed = self
            .live_since
            .take()
            .map(|since| since.elapsed())
            .unwrap_or_default();
        if let Some(stats) = self.controller.stats() {
            let summary = format_session_stats(&stats, elapsed);
            if !summary.is_empty() {
                print!("{summary}");
            }
        }
    }

    fn handle_key(&mut self, key: Key) -> bool {
        clear_level_line();
        match key {
            Key::ToggleMic => {
                let enabled = !self.controller.mic_enabled();
                let applied = self.controller.set_mic_enabled(enabled);
                println!(
                    "microphone {}{}",
                    if enabled { "on" } else { "muted" },
                    if applied { "" } else { " (next session)" }
                );
            }
            Key::ToggleCamera => {
                let enabled = !self.controller.camera_enabled();
                let applied = self.controller.set_camera_enabled(enabled);
                println!(
                    "camera {}{}",
                    if enabled { "on" } else { "off" },
                    if applied { "" } else { " (next session)" }
                );
            }
            Key::Stats => match self.controller.stats() {
                Some(stats) => println!(
                    "sent {} audio / {} video, received {} audio, {} decode errors",
                    stats.audio_chunks_sent,
                    stats.video_chunks_sent,
                    stats.audio_chunks_scheduled,
                    stats.decode_errors
                ),
                None => println!("no session yet"),
            },
            Key::Reconnect => {
                if let Err(err) = self.controller.connect() {
                    log_debug(&format!("interactive connect failed: {err}"));
                }
            }
            Key::Disconnect => self.controller.disconnect(),
            Key::Help => print_help(),
            Key::Quit => return false,
        }
        true
    }

    fn render_levels(&mut self, now: Instant) {
        if self.controller.status() != ConnectionStatus::Live
            || now.duration_since(self.last_level_update) < LEVEL_UPDATE
        {
            return;
        }
        self.last_level_update = now;
        let ring = self.controller.ring(LEVEL_BARS);
        let mic = match self.controller.mic_level_db() {
            Some(db) if self.controller.mic_enabled() => format!("{db:>6.1} dB"),
            _ => " muted  ".to_string(),
        };
        print!("\r\x1b[2Kmic {mic} | model {}", level_strip(&ring.bars));
        let _ = io::stdout().flush();
    }
}

pub(crate) fn run(config: AppConfig) -> Result<()> {
    let controller = LiveController::new(
        Box::new(SystemDevices::new()),
        Box::new(WebSocketConnector::new()),
        config.session_settings(),
        config.media_request(),
        config.channel_config(),
    );
    let mut console = Console {
        controller,
        live_since: None,
        last_level_update: Instant::now(),
    };

    println!("VoxLive {}", env!("CARGO_PKG_VERSION"));
    print_help();
    let input_rx = spawn_input_thread();

    if let Err(err) = console.controller.connect() {
        log_debug(&format!("initial connect failed: {err}"));
    }
    console.print_notices();

    loop {
        match input_rx.try_recv() {
            Ok(line) => match parse_key(&line) {
                Some(key) => {
                    if !console.handle_key(key) {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => println!("unknown command '{}', press h for help", line.trim()),
            },
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        let now = Instant::now();
        console.controller.pump(now);
        console.print_notices();
        console.render_levels(now);
        thread::sleep(LOOP_SLEEP);
    }

    console.controller.disconnect();
    console.print_notices();
    Ok(())
}
