//! Per-connection state of the server engine
//!
//! Everything `Init` resets lives here: the control and data connections,
//! working directory, pending rename, command reader and transfer state.

use log::{debug, warn};

use crate::middleware::logging::log_reply;
use crate::protocol::commands::ParsedCommand;
use crate::protocol::parser::CommandReader;
use crate::protocol::responses::{
    GOODBYE, LOCAL_ERROR, SERVICE_TERMINATED, TRANSFER_ABORTED, TRANSFER_COMPLETE,
    format_response,
};
use crate::transfer::{Connection, DataChannel, DataMode, TransferFailure};
use crate::utils::Deadline;

/// What the data channel is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferState {
    #[default]
    Idle,
    Retrieving,
    Storing,
}

pub struct Session {
    pub control: Connection,
    pub channel: DataChannel,
    pub mode: DataMode,
    pub cwd: String,
    pub rename_from: Option<String>,
    pub reader: CommandReader,
    /// The command being processed. No further input is parsed while set.
    pub pending: Option<ParsedCommand>,
    pub transfer: TransferState,
    pub logged_in: bool,
    /// Bounds how long a passive data connection is waited for.
    pub data_deadline: Deadline,
}

impl Session {
    /// `max_block` caps transfer buffer allocations when set.
    pub fn new(max_command_length: usize, max_block: Option<usize>) -> Self {
        Self {
            control: Connection::default(),
            channel: max_block.map_or_else(DataChannel::new, DataChannel::with_max_block),
            mode: DataMode::Passive,
            cwd: "/".to_string(),
            rename_from: None,
            reader: CommandReader::new(max_command_length),
            pending: None,
            transfer: TransferState::Idle,
            logged_in: false,
            data_deadline: Deadline::never(),
        }
    }

    /// Back to the state of a freshly accepted connection, keeping the
    /// control connection itself.
    pub fn reset(&mut self) {
        self.channel.close_transfer();
        self.mode = DataMode::Passive;
        self.cwd = "/".to_string();
        self.rename_from = None;
        self.reader.clear();
        self.pending = None;
        self.transfer = TransferState::Idle;
        self.logged_in = false;
        self.data_deadline.reset_to_never();
    }

    /// Sends one `code text` reply line.
    pub fn reply(&mut self, code: u16, message: &str) {
        self.send_raw(&format_response(code, message));
    }

    /// Sends preformatted reply text as-is.
    pub fn send_raw(&mut self, text: &str) {
        log_reply(text);
        if let Err(e) = self.control.write_all(text.as_bytes()) {
            warn!("Failed to send reply: {}", e);
        }
    }

    /// Stops an active transfer, telling the peer with a 426.
    pub fn abort_transfer(&mut self) {
        if self.transfer != TransferState::Idle {
            self.channel.close_transfer();
            self.reply(TRANSFER_ABORTED, "Transfer aborted");
        }
        self.channel.close_transfer();
        self.transfer = TransferState::Idle;
    }

    /// Aborts any transfer, says goodbye and closes the control connection.
    pub fn disconnect(&mut self, gracious: bool) {
        debug!("Disconnecting client");
        self.abort_transfer();
        if gracious {
            self.reply(GOODBYE, "Goodbye.");
        } else {
            self.reply(SERVICE_TERMINATED, "Service terminated.");
        }
        self.control.close();
    }

    /// Ends a transfer whose pump has stopped, reporting success or the
    /// failure that stopped it.
    pub fn end_transfer(&mut self) {
        match self.channel.failure() {
            None => self.finish_transfer(),
            Some(failure) => {
                warn!(
                    "Transfer failed after {} bytes: {:?}",
                    self.channel.bytes_transferred(),
                    failure
                );
                self.channel.close_transfer();
                self.transfer = TransferState::Idle;
                match failure {
                    TransferFailure::Network => {
                        self.reply(TRANSFER_ABORTED, "Connection closed; transfer aborted.")
                    }
                    TransferFailure::File => self.reply(
                        LOCAL_ERROR,
                        "Requested action aborted: local error in processing.",
                    ),
                }
            }
        }
    }

    /// Ends a transfer that ran to completion and reports statistics.
    fn finish_transfer(&mut self) {
        let elapsed_ms = self.channel.elapsed().as_millis();
        let bytes = self.channel.bytes_transferred();
        debug!("Transfer finished: {} bytes in {} ms", bytes, elapsed_ms);

        if elapsed_ms > 0 && bytes > 0 {
            let rate = bytes as f64 / elapsed_ms as f64;
            self.reply(
                TRANSFER_COMPLETE,
                &format!(
                    "File successfully transferred, {} ms, {:.2} kB/s.",
                    elapsed_ms, rate
                ),
            );
        } else {
            self.reply(TRANSFER_COMPLETE, "File successfully transferred.");
        }
        self.channel.close_transfer();
        self.transfer = TransferState::Idle;
    }
}
