mod app;
pub mod audio;
pub mod channel;
pub mod config;
pub mod error;
pub mod ipc;
mod lock;
pub mod media;
pub mod session;
pub mod telemetry;
#[cfg(test)]
pub(crate) mod test_support;
pub mod video;

pub(crate) use app::set_log_session;
pub(crate) use lock::lock_or_recover;
pub use app::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
    log_timing,
};
pub use session::{ConnectionStatus, LiveController, SessionNotice, SessionState};
