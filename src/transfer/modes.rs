//! FTP data connection modes

use std::net::SocketAddrV4;

/// Who opens the data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataMode {
    /// The peer connects to our passive listener (PASV).
    #[default]
    Passive,
    /// We connect to the address the peer announced (PORT).
    Active(SocketAddrV4),
}
