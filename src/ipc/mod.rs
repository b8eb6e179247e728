//! JSON IPC mode for external UI integration.
//!
//! A non-blocking JSON-lines protocol over stdin/stdout so that an external
//! frontend can drive live sessions and render the visualizer.
//!
//! Architecture:
//! - Stdin reader thread: reads JSON commands, sends to main loop via channel
//! - Main event loop: handles commands and pumps the live session every 5 ms
//!
//! Protocol:
//! - Each line is a JSON object
//! - Events (Rust → client): {"event": "...", ...}
//! - Commands (client → Rust): {"cmd": "...", ...}

mod protocol;
mod router;
mod session;


pub use protocol::{IpcCommand, IpcEvent};
pub use session::run_ipc_mode;
