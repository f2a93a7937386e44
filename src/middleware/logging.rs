//! Logging middleware
//!
//! Shared formatting for control-connection log lines.

use log::{debug, info};
use std::net::SocketAddr;

/// Log a client connection
pub fn log_connection(client_addr: Option<SocketAddr>) {
    match client_addr {
        Some(addr) => info!("Client connected: {}", addr),
        None => info!("Client connected"),
    }
}

/// Log a client disconnect
pub fn log_disconnect(client_addr: Option<SocketAddr>, reason: &str) {
    match client_addr {
        Some(addr) => info!("Client {} disconnected: {}", addr, reason),
        None => info!("Client disconnected: {}", reason),
    }
}

/// Log a client command. Passwords are never written out.
pub fn log_command(token: &str, params: &str) {
    debug!("Command: {} [{}]", token, loggable_params(token, params));
}

/// `params` as it may appear in a log line.
pub fn loggable_params<'a>(token: &str, params: &'a str) -> &'a str {
    if token.eq_ignore_ascii_case("PASS") && !params.is_empty() {
        "********"
    } else {
        params
    }
}

/// Log a reply sent on the control connection
pub fn log_reply(reply: &str) {
    debug!(">>> {}", reply.trim_end());
}
