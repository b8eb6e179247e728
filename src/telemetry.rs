use crate::config::AppConfig;
use crate::session::SessionState;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::MakeWriter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub fn tracing_log_path() -> PathBuf {
    env::var("VOXLIVE_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("voxlive_trace.jsonl"))
}

/// Install the JSON trace writer once per process when logging is enabled.
pub fn init_tracing(config: &AppConfig) {
    let enabled = (config.logs || config.log_timings) && !config.no_logs;
    if !enabled {
        return;
    }

    let _ = TRACING_INIT.get_or_init(|| {
        let path = tracing_log_path();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(_) => return,
        };
        let _ = tracing::subscriber::set_global_default(json_subscriber(file));
    });
}

/// Every level is kept: teardown steps log at debug and playback at trace.
fn json_subscriber<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer)
        .with_max_level(tracing::Level::TRACE)
        .with_current_span(false)
        .with_span_list(false)
        .finish()
}

pub(crate) fn record_transition(session_id: &str, from: SessionState, to: SessionState) {
    tracing::info!(
        target: "voxlive::session",
        session_id,
        from = from.label(),
        to = to.label(),
        "session_transition"
    );
}

pub(crate) fn record_teardown_step(session_id: &str, step: &'static str, error: Option<&str>) {
    match error {
        Some(error) => tracing::warn!(
            target: "voxlive::session",
            session_id,
            step,
            error,
            "teardown_step_failed"
        ),
        None => tracing::debug!(target: "voxlive::session", session_id, step, "teardown_step"),
    }
}

pub(crate) fn record_playback(session_id: &str, start: f64, duration: f64, queued_ahead: f64) {
    tracing::trace!(
        target: "voxlive::playback",
        session_id,
        start,
        duration,
        queued_ahead,
        "chunk_scheduled"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("capture lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn trace_file_keeps_debug_and_trace_events() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = json_subscriber(move || writer.clone());
        tracing::subscriber::with_default(subscriber, || {
            record_transition("s-1", SessionState::Active, SessionState::Closing);
            record_teardown_step("s-1", "capture_node", None);
            record_playback("s-1", 0.5, 0.02, 0.1);
        });

        let bytes = captured.0.lock().expect("capture lock").clone();
        let text = String::from_utf8(bytes).expect("utf8 trace");
        assert!(text.contains("session_transition"), "{text}");
        assert!(text.contains("teardown_step"), "{text}");
        assert!(text.contains("\"DEBUG\""), "{text}");
        assert!(text.contains("chunk_scheduled"), "{text}");
        assert!(text.contains("\"TRACE\""), "{text}");
    }
}
