//! Module `state`
//!
//! Client engine states and transfer directions.

/// Steps of one client session, in order. `Timeout` and `Error` are the
/// failure states; everything from `Idle` on counts as "not busy".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClientState {
    Connect,
    Greet,
    User,
    Password,
    Passive,
    DataConnect,
    Transfer,
    Finish,
    Quit,
    Idle,
    Timeout,
    Error,
}

impl ClientState {
    /// Whether a new transfer may be started.
    pub fn is_ready(self) -> bool {
        self >= ClientState::Idle
    }
}

/// Which way the file goes and whether `transfer()` waits for the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Put,
    #[default]
    Get,
    PutNonBlocking,
    GetNonBlocking,
}

impl Direction {
    pub fn is_put(self) -> bool {
        matches!(self, Direction::Put | Direction::PutNonBlocking)
    }

    pub fn is_blocking(self) -> bool {
        matches!(self, Direction::Put | Direction::Get)
    }
}
