//! Transfer result types

/// Outcome of one attempt to establish the data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataConnectState {
    /// Passive mode and the peer has not connected yet; try again later.
    NotReady,
    Ready,
    Failed,
}

/// Why a pump gave up before the transfer was complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFailure {
    /// The data connection broke or was closed early.
    Network,
    /// Reading or writing the local file failed.
    File,
}
