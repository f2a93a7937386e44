//! Client status reporting

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferResult {
    InProgress,
    Ok,
    Error,
}

/// Outcome of the current or last client session.
///
/// `code` carries either the last FTP reply code or, when negative, a
/// [`ClientError`] code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub result: TransferResult,
    pub code: i16,
    pub desc: String,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            result: TransferResult::Ok,
            code: 0,
            desc: String::new(),
        }
    }
}

impl Status {
    /// The local failure behind `code`, if it is one.
    pub fn failure(&self) -> Option<ClientError> {
        ClientError::from_code(self.code)
    }

    pub(crate) fn fail(&mut self, error: ClientError) {
        self.result = TransferResult::Error;
        self.code = error.code();
        self.desc = error.to_string();
    }
}
