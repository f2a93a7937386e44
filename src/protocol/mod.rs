//! FTP Protocol implementation
//!
//! Handles FTP command parsing, dispatch, listing formats and response
//! generation for the server engine.

pub mod commands;
pub mod handlers;
pub mod listing;
pub mod parser;
pub mod responses;

pub use commands::{Command, CommandStatus, ParsedCommand};
pub use handlers::{CommandContext, handle_command};
pub use parser::{CommandReader, ReadEvent};
