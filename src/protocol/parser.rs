//! Command line assembly
//!
//! Bytes from the control connection are fed in one at a time; a complete
//! line yields a [`ParsedCommand`].

use crate::protocol::commands::ParsedCommand;

/// What a single byte completed, if anything.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadEvent {
    Line(ParsedCommand),
    /// The line exceeded the maximum length. Its remaining bytes are
    /// discarded up to the next line end.
    TooLong,
}

#[derive(Debug)]
pub struct CommandReader {
    line: String,
    max_length: usize,
    discarding: bool,
}

impl CommandReader {
    pub fn new(max_length: usize) -> Self {
        Self {
            line: String::new(),
            max_length,
            discarding: false,
        }
    }

    pub fn clear(&mut self) {
        self.line.clear();
        self.discarding = false;
    }

    pub fn feed(&mut self, byte: u8) -> Option<ReadEvent> {
        let c = match byte {
            b'\\' => '/',
            b => char::from(b),
        };

        if c == '\r' || c == '\n' {
            if self.discarding {
                self.discarding = false;
                return None;
            }
            let line = std::mem::take(&mut self.line);
            return parse_line(&line).map(ReadEvent::Line);
        }

        if self.discarding {
            return None;
        }
        if self.line.len() >= self.max_length {
            self.line.clear();
            self.discarding = true;
            return Some(ReadEvent::TooLong);
        }
        self.line.push(c);
        None
    }
}

/// Splits a raw line into verb and parameters. Empty lines yield `None`.
pub fn parse_line(line: &str) -> Option<ParsedCommand> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (token, params) = match trimmed.split_once(' ') {
        Some((token, params)) => (token, params.trim()),
        None => (trimmed, ""),
    };
    Some(ParsedCommand::new(token, params))
}
