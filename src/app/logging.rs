//! File diagnostics for a process whose stdout may be the IPC stream.
//!
//! Debug lines land in a size-capped file in the temp dir. Each line is tagged
//! with the session driven on the logging thread (id and state) and mirrored
//! into the JSON trace as a `voxlive::debug` event, so the two logs line up.

use crate::config::AppConfig;
use crate::session::SessionState;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::cell::RefCell;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DEBUG_LOG_CAP: u64 = 5 * 1024 * 1024;
const CRASH_LOG_CAP: u64 = 256 * 1024;
const NO_SESSION: &str = "-";

static DEBUG_ON: AtomicBool = AtomicBool::new(false);
static CONTENT_ON: AtomicBool = AtomicBool::new(false);
static TIMINGS_ON: AtomicBool = AtomicBool::new(false);
static SINK: OnceLock<Mutex<Sink>> = OnceLock::new();

thread_local! {
    /// `<id> <state>` of the session this thread is driving.
    static SESSION_TAG: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Debug log location; `VOXLIVE_LOG_FILE` overrides the temp-dir default.
pub fn log_file_path() -> PathBuf {
    env::var("VOXLIVE_LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("voxlive_debug.log"))
}

/// Crash log location. Panics are recorded here even when content logging is off,
/// but only with their location.
pub fn crash_log_path() -> PathBuf {
    env::temp_dir().join("voxlive_crash.log")
}

/// Append-only file that starts over once the next line would pass `cap` bytes.
struct CappedFile {
    path: PathBuf,
    file: File,
    cap: u64,
    len: u64,
}

impl CappedFile {
    fn open(path: &Path, cap: u64) -> Option<Self> {
        let existing = fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
        let fresh = existing > cap;
        let file = OpenOptions::new()
            .create(true)
            .append(!fresh)
            .write(true)
            .truncate(fresh)
            .open(path)
            .ok()?;
        Some(Self {
            path: path.to_path_buf(),
            file,
            cap,
            len: if fresh { 0 } else { existing },
        })
    }

    fn append(&mut self, line: &str) {
        if self.len.saturating_add(line.len() as u64) > self.cap {
            if let Some(fresh) = Self::open_truncated(&self.path, self.cap) {
                *self = fresh;
            }
        }
        if self.file.write_all(line.as_bytes()).is_ok() {
            self.len = self.len.saturating_add(line.len() as u64);
        }
    }

    fn open_truncated(path: &Path, cap: u64) -> Option<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .ok()?;
        Some(Self {
            path: path.to_path_buf(),
            file,
            cap,
            len: 0,
        })
    }
}

#[derive(Default)]
struct Sink {
    file: Option<CappedFile>,
}

/// The sink must stay usable after a panic while it was held, and it cannot
/// report its own poisoning through itself.
fn sink() -> MutexGuard<'static, Sink> {
    SINK.get_or_init(|| Mutex::new(Sink::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}

fn apply_switches(enabled: bool, content: bool, timings: bool) {
    DEBUG_ON.store(enabled, Ordering::Relaxed);
    CONTENT_ON.store(enabled && content, Ordering::Relaxed);
    TIMINGS_ON.store(enabled && timings, Ordering::Relaxed);
    sink().file = if enabled {
        CappedFile::open(&log_file_path(), DEBUG_LOG_CAP)
    } else {
        None
    };
}

/// `--logs`/`--log-timings` turn the file on, `--no-logs` wins over both.
pub fn init_logging(config: &AppConfig) {
    let enabled = (config.logs || config.log_timings) && !config.no_logs;
    apply_switches(enabled, config.log_content, config.log_timings);
}

/// Tag this thread's subsequent lines with the session. Terminal states drop the tag.
pub(crate) fn set_log_session(id: &str, state: SessionState) {
    let tag = (!state.is_terminal()).then(|| format!("{id} {}", state.label()));
    SESSION_TAG.with(|slot| *slot.borrow_mut() = tag);
}

fn session_tag() -> String {
    SESSION_TAG
        .with(|slot| slot.borrow().clone())
        .unwrap_or_else(|| NO_SESSION.to_string())
}

pub fn log_debug(msg: &str) {
    if !DEBUG_ON.load(Ordering::Relaxed) {
        return;
    }
    let tag = session_tag();
    if let Some(file) = sink().file.as_mut() {
        file.append(&format!("[{}] [{tag}] {msg}\n", unix_millis()));
    }
    tracing::debug!(target: "voxlive::debug", session = %tag, "{msg}");
}

/// Lines that may carry user content (device names, remote close reasons).
pub fn log_debug_content(msg: &str) {
    if CONTENT_ON.load(Ordering::Relaxed) {
        log_debug(msg);
    }
}

/// Record how long a lifecycle step took (`--log-timings`).
pub fn log_timing(label: &str, elapsed: Duration) {
    if !TIMINGS_ON.load(Ordering::Relaxed) {
        return;
    }
    let millis = elapsed.as_secs_f64() * 1000.0;
    log_debug(&format!("timing {label}: {millis:.1} ms"));
    tracing::info!(target: "voxlive::timing", label, millis, "step_timing");
}

/// Append one crash line: location always, payload only with `--log-content`.
pub fn log_panic(info: &PanicHookInfo<'_>) {
    if !DEBUG_ON.load(Ordering::Relaxed) {
        return;
    }
    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown".to_string());
    let payload = if CONTENT_ON.load(Ordering::Relaxed) {
        info.payload()
            .downcast_ref::<&str>()
            .map(|text| (*text).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string())
    } else {
        "payload omitted".to_string()
    };
    let line = format!(
        "[{}] [{}] panic at {location}: {payload} (v{})\n",
        unix_millis(),
        session_tag(),
        env!("CARGO_PKG_VERSION")
    );
    if let Some(mut file) = CappedFile::open(&crash_log_path(), CRASH_LOG_CAP) {
        file.append(&line);
    }
}

#[cfg(test)]
pub(crate) fn set_logging_for_tests(enabled: bool, content_enabled: bool) {
    apply_switches(enabled, content_enabled, false);
}
