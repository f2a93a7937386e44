//! Server core functionality
//!
//! The tick-driven FTP server engine and its per-session state.

pub mod core;
pub mod session;

pub use core::{ControlState, Server};
pub use session::{Session, TransferState};
