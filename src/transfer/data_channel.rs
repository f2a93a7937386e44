//! Module `data_channel`
//!
//! Owns everything one transfer needs: the data connection, the open file,
//! the scratch buffer and the byte counters. Both engines hold exactly one
//! `DataChannel`, which is what limits a session to a single transfer.

use log::{debug, info, warn};
use std::io::ErrorKind;
use std::net::{SocketAddr, SocketAddrV4, TcpListener};
use std::ops::Range;
use std::time::{Duration, Instant};

use crate::storage::FileHandle;
use crate::transfer::buffer::TransferBuffer;
use crate::transfer::connection::Connection;
use crate::transfer::results::{DataConnectState, TransferFailure};

#[derive(Default)]
pub struct DataChannel {
    pub(crate) data: Connection,
    pub(crate) file: Option<Box<dyn FileHandle>>,
    pub(crate) buffer: TransferBuffer,
    pub(crate) bytes_transferred: u64,
    /// Part of `buffer` read from the file but not yet taken by the socket.
    pub(crate) unsent: Range<usize>,
    pub(crate) failure: Option<TransferFailure>,
    started: Option<Instant>,
}

impl DataChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose buffer allocations are capped, see
    /// [`TransferBuffer::with_max_block`].
    pub fn with_max_block(max_block: usize) -> Self {
        Self {
            buffer: TransferBuffer::with_max_block(max_block),
            ..Self::default()
        }
    }

    /// Opens a fresh outbound data connection, closing any previous one.
    pub fn open_data_connection(&mut self, addr: SocketAddrV4, timeout: Duration) -> bool {
        self.data.close();
        debug!("Open data connection to {}", addr);
        match Connection::connect(SocketAddr::V4(addr), timeout) {
            Ok(conn) => {
                self.data = conn;
                true
            }
            Err(e) => {
                warn!("Data connection to {} failed: {}", addr, e);
                false
            }
        }
    }

    /// Passive mode: picks up the peer's data connection if it has arrived.
    ///
    /// Never blocks; `NotReady` means the caller should ask again on a
    /// later tick.
    pub fn accept_or_retry(&mut self, listener: Option<&TcpListener>) -> DataConnectState {
        if self.data.is_connected() {
            return DataConnectState::Ready;
        }
        let Some(listener) = listener else {
            warn!("Passive data connection requested without a listener");
            return DataConnectState::Failed;
        };

        match listener.accept() {
            Ok((stream, peer)) => match Connection::from_stream(stream) {
                Ok(conn) => {
                    info!("Got incoming (passive) data connection from {}", peer);
                    self.data.close();
                    self.data = conn;
                    DataConnectState::Ready
                }
                Err(e) => {
                    warn!("Failed to configure data connection from {}: {}", peer, e);
                    DataConnectState::Failed
                }
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => DataConnectState::NotReady,
            Err(e) => {
                warn!("Failed to accept passive data connection: {}", e);
                DataConnectState::Failed
            }
        }
    }

    /// Resets the counters at the start of a data phase.
    pub fn begin(&mut self) {
        self.bytes_transferred = 0;
        self.unsent = 0..0;
        self.failure = None;
        self.started = Some(Instant::now());
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Time since [`DataChannel::begin`].
    pub fn elapsed(&self) -> Duration {
        self.started.map_or(Duration::ZERO, |s| s.elapsed())
    }

    /// Set when a pump stopped because of an error rather than at the end
    /// of the data.
    pub fn failure(&self) -> Option<TransferFailure> {
        self.failure
    }

    pub fn set_file(&mut self, file: Box<dyn FileHandle>) {
        self.file = Some(file);
    }

    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn file_size(&self) -> u64 {
        self.file.as_ref().map_or(0, |f| f.size())
    }

    pub fn allocate_buffer(&mut self, preferred: usize) -> usize {
        self.buffer.allocate(preferred)
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_allocated()
    }

    pub fn data_connection(&mut self) -> &mut Connection {
        &mut self.data
    }

    pub fn is_data_connected(&mut self) -> bool {
        self.data.is_connected()
    }

    pub fn close_data(&mut self) {
        self.data.close();
    }

    /// Closes the data connection and the file and frees the buffer.
    /// Safe to call any number of times.
    pub fn close_transfer(&mut self) {
        self.data.close();
        self.file = None;
        self.buffer.free();
        self.unsent = 0..0;
    }
}
