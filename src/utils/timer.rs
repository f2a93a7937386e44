//! One-shot deadline used for reply and idle timeouts.

use std::time::{Duration, Instant};

/// A one-shot timer that can also be parked in a "never expires" state.
///
/// The never-expires state doubles as "waiting has not started yet" for
/// callers that arm the timer lazily on their first poll.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    pub fn never() -> Self {
        Self { expires_at: None }
    }

    /// Arms the timer to expire `timeout` from now.
    pub fn reset(&mut self, timeout: Duration) {
        self.expires_at = Some(Instant::now() + timeout);
    }

    pub fn reset_to_never(&mut self) {
        self.expires_at = None;
    }

    pub fn can_expire(&self) -> bool {
        self.expires_at.is_some()
    }

    pub fn expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }
}
