//! Module `connection`
//!
//! Non-blocking TCP connection used for both control and data channels.
//! Incoming bytes are drained from the socket into an inbox so the engines
//! can ask "how much is available" without ever blocking.

use log::{debug, warn};
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound of buffered, not yet consumed, incoming bytes.
const INBOX_LIMIT: usize = 64 * 1024;
const READ_CHUNK: usize = 4096;
/// How long a single write may wait for the peer to drain its window.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
pub struct Connection {
    stream: Option<TcpStream>,
    inbox: VecDeque<u8>,
    peer_closed: bool,
}

impl Connection {
    /// Opens an outbound connection, waiting at most `timeout`.
    pub fn connect(addr: SocketAddr, timeout: Duration) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        Self::from_stream(stream)
    }

    /// Wraps an accepted stream and switches it to non-blocking mode.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to disable Nagle on {:?}: {}", stream.peer_addr(), e);
        }
        Ok(Self {
            stream: Some(stream),
            inbox: VecDeque::new(),
            peer_closed: false,
        })
    }

    /// Whether a socket is held at all, regardless of the peer's state.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// True while the peer has not closed, or while unread bytes remain.
    pub fn is_connected(&mut self) -> bool {
        self.fill();
        self.stream.is_some() && (!self.peer_closed || !self.inbox.is_empty())
    }

    /// Number of bytes that can be read right now without blocking.
    pub fn available(&mut self) -> usize {
        self.fill();
        self.inbox.len()
    }

    /// Reads up to `buf.len()` already available bytes.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.fill();
        let n = buf.len().min(self.inbox.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbox.drain(..n)) {
            *slot = byte;
        }
        n
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        if self.inbox.is_empty() {
            self.fill();
        }
        self.inbox.pop_front()
    }

    /// One non-blocking write. Returns how many bytes the socket took,
    /// which is 0 while its send window is full.
    pub fn write_some(&mut self, data: &[u8]) -> io::Result<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::new(ErrorKind::NotConnected, "connection closed"));
        };
        if data.is_empty() {
            return Ok(0);
        }

        match stream.write(data) {
            Ok(0) => {
                self.peer_closed = true;
                Err(io::Error::new(ErrorKind::WriteZero, "peer stopped reading"))
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                Ok(0)
            }
            Err(e) => {
                self.peer_closed = true;
                Err(e)
            }
        }
    }

    /// Writes the whole buffer, yielding while the socket would block.
    ///
    /// Meant for short control replies and listings; file data goes
    /// through [`Connection::write_some`].
    pub fn write_all(&mut self, mut data: &[u8]) -> io::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::new(ErrorKind::NotConnected, "connection closed"));
        };

        let started = Instant::now();
        while !data.is_empty() {
            match stream.write(data) {
                Ok(0) => {
                    self.peer_closed = true;
                    return Err(io::Error::new(ErrorKind::WriteZero, "peer stopped reading"));
                }
                Ok(n) => data = &data[n..],
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if started.elapsed() > WRITE_TIMEOUT {
                        return Err(io::Error::new(ErrorKind::TimedOut, "write timed out"));
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.peer_closed = true;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Shuts the socket down and drops any unread input. Idempotent.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.inbox.clear();
        self.peer_closed = false;
    }

    fn fill(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        if self.peer_closed {
            return;
        }

        let mut chunk = [0u8; READ_CHUNK];
        while self.inbox.len() < INBOX_LIMIT {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    self.peer_closed = true;
                    break;
                }
                Ok(n) => self.inbox.extend(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Connection {:?} failed: {}", stream.peer_addr(), e);
                    self.peer_closed = true;
                    break;
                }
            }
        }
    }
}
