//! Live session lifecycle: state machine, device switches and the controller
//! that front ends talk to.

mod controller;
mod devices;
mod lifecycle;
mod state;

pub use controller::{LiveController, SessionNotice};
pub use lifecycle::{Session, SessionStats, TeardownStep};
pub use state::{ConnectionStatus, SessionState};
