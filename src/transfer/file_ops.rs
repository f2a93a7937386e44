//! Module `file_ops`
//!
//! The two pumps moving bytes between the open file and the data
//! connection. Each call moves at most one buffer's worth and never waits
//! for the network, so callers simply invoke them again on the next tick.

use log::{debug, error, warn};
use std::io::{Read, Write};

use crate::transfer::data_channel::DataChannel;
use crate::transfer::results::TransferFailure;

impl DataChannel {
    /// Sends the next chunk of the file.
    ///
    /// A chunk the socket did not fully take is kept and offered again on
    /// the next call before anything new is read from the file. Returns
    /// false once the whole file was sent or the transfer failed, see
    /// [`DataChannel::failure`].
    pub fn pump_file_to_network(&mut self) -> bool {
        let remaining = self.file_size().saturating_sub(self.bytes_transferred);
        if remaining == 0 {
            return false;
        }
        if !self.data.is_connected() {
            warn!("Data connection lost with {} bytes left to send", remaining);
            return self.fail(TransferFailure::Network);
        }

        if self.unsent.is_empty() {
            let Some(file) = self.file.as_mut() else {
                return self.fail(TransferFailure::File);
            };
            let buffer = self.buffer.as_mut_slice();
            let chunk = buffer.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            match file.read(&mut buffer[..chunk]) {
                Ok(0) => {
                    error!("Transfer file ended {} bytes early", remaining);
                    return self.fail(TransferFailure::File);
                }
                Ok(n) => self.unsent = 0..n,
                Err(e) => {
                    error!("Read error on transfer file: {}", e);
                    return self.fail(TransferFailure::File);
                }
            }
        }

        let range = self.unsent.clone();
        match self.data.write_some(&self.buffer.as_mut_slice()[range]) {
            Ok(n) => {
                if n > 0 {
                    debug!("Transfer {} bytes fs->net", n);
                }
                self.unsent.start += n;
                self.bytes_transferred += n as u64;
                true
            }
            Err(e) => {
                warn!("Write failure on data connection: {}", e);
                self.fail(TransferFailure::Network)
            }
        }
    }

    /// Stores whatever the data connection has delivered so far.
    ///
    /// Only reads what is already available. Returns false once the peer
    /// has closed and nothing was left to read, i.e. at end of stream, or
    /// when the file could not be written.
    pub fn pump_network_to_file(&mut self) -> bool {
        let available = self.data.available();
        let mut moved = 0;

        if available > 0 {
            let buffer = self.buffer.as_mut_slice();
            let chunk = available.min(buffer.len());
            moved = self.data.read(&mut buffer[..chunk]);
            if moved > 0 {
                debug!("Transfer {} bytes net->fs", moved);
                let Some(file) = self.file.as_mut() else {
                    return self.fail(TransferFailure::File);
                };
                if let Err(e) = file.write_all(&buffer[..moved]) {
                    error!("Write error on transfer file: {}", e);
                    return self.fail(TransferFailure::File);
                }
                self.bytes_transferred += moved as u64;
            }
        }

        self.data.is_connected() || moved > 0
    }

    fn fail(&mut self, failure: TransferFailure) -> bool {
        self.failure = Some(failure);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, OpenMode, Storage};
    use crate::transfer::connection::Connection;
    use std::io::Read as _;
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::{Duration, Instant};

    fn channel_with_peer() -> (DataChannel, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = TcpStream::connect(addr).unwrap();
        let (stream, _) = listener.accept().unwrap();

        let mut channel = DataChannel::new();
        channel.data = Connection::from_stream(stream).unwrap();
        (channel, peer)
    }

    #[test]
    fn test_file_to_network_sends_whole_file() {
        let storage = MemoryStorage::new();
        let content: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        storage.insert_file("/src.bin", &content);

        let (mut channel, mut peer) = channel_with_peer();
        channel.set_file(storage.open("/src.bin", OpenMode::Read).unwrap());
        assert_eq!(channel.allocate_buffer(1460), 1460);
        channel.begin();

        let mut pumps = 0;
        while channel.pump_file_to_network() {
            pumps += 1;
        }
        assert!(pumps >= 4);
        assert!(channel.failure().is_none());
        assert_eq!(channel.bytes_transferred(), 5000);
        channel.close_transfer();

        let mut received = Vec::new();
        peer.read_to_end(&mut received).unwrap();
        assert_eq!(received, content);
    }

    #[test]
    fn test_network_to_file_until_end_of_stream() {
        let storage = MemoryStorage::new();
        let (mut channel, mut peer) = channel_with_peer();
        channel.set_file(storage.open("/dst.bin", OpenMode::Write).unwrap());
        channel.allocate_buffer(512);
        channel.begin();

        // nothing sent yet: keep going, do not block
        assert!(channel.pump_network_to_file());

        let content = vec![42u8; 3000];
        peer.write_all(&content).unwrap();
        drop(peer);

        let started = Instant::now();
        while channel.pump_network_to_file() {
            assert!(started.elapsed() < Duration::from_secs(5));
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(channel.bytes_transferred(), 3000);
        channel.close_transfer();
        assert_eq!(storage.read_file("/dst.bin"), Some(content));
    }

    #[test]
    fn test_file_to_network_stops_without_connection() {
        let storage = MemoryStorage::new();
        storage.insert_file("/f", b"data");
        let mut channel = DataChannel::new();
        channel.set_file(storage.open("/f", OpenMode::Read).unwrap());
        channel.allocate_buffer(16);
        assert!(!channel.pump_file_to_network());
        assert_eq!(channel.failure(), Some(TransferFailure::Network));
    }

    #[test]
    fn test_file_to_network_keeps_unsent_bytes_for_slow_peer() {
        let storage = MemoryStorage::new();
        let content: Vec<u8> = (0..32 * 1024 * 1024u32).map(|i| (i % 241) as u8).collect();
        storage.insert_file("/big.bin", &content);

        let (mut channel, peer) = channel_with_peer();
        channel.set_file(storage.open("/big.bin", OpenMode::Read).unwrap());
        channel.allocate_buffer(64 * 1024);
        channel.begin();

        // the peer reads nothing until its window and ours are full
        let started = Instant::now();
        let mut stalled_calls = 0;
        while stalled_calls < 50 && started.elapsed() < Duration::from_secs(20) {
            let before = channel.bytes_transferred();
            let call = Instant::now();
            assert!(channel.pump_file_to_network());
            assert!(call.elapsed() < Duration::from_millis(500));
            if channel.bytes_transferred() == before {
                stalled_calls += 1;
            }
        }
        assert_eq!(stalled_calls, 50);
        assert!(channel.bytes_transferred() < content.len() as u64);
        assert!(channel.failure().is_none());

        let reader = thread::spawn(move || {
            let mut peer = peer;
            let mut received = Vec::new();
            peer.read_to_end(&mut received).unwrap();
            received
        });
        while channel.pump_file_to_network() {
            assert!(started.elapsed() < Duration::from_secs(60));
        }
        assert!(channel.failure().is_none());
        assert_eq!(channel.bytes_transferred(), content.len() as u64);
        channel.close_transfer();
        assert_eq!(reader.join().unwrap(), content);
    }

    #[test]
    fn test_file_to_network_fails_when_peer_leaves_early() {
        let storage = MemoryStorage::new();
        storage.insert_file("/f.bin", &vec![5u8; 4 * 1024 * 1024]);

        let (mut channel, peer) = channel_with_peer();
        channel.set_file(storage.open("/f.bin", OpenMode::Read).unwrap());
        channel.allocate_buffer(1460);
        channel.begin();
        assert!(channel.pump_file_to_network());
        drop(peer);

        let started = Instant::now();
        while channel.pump_file_to_network() {
            assert!(started.elapsed() < Duration::from_secs(5));
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(channel.failure(), Some(TransferFailure::Network));
        assert!(channel.bytes_transferred() < 4 * 1024 * 1024);
    }

    #[test]
    fn test_close_transfer_twice() {
        let storage = MemoryStorage::new();
        let (mut channel, _peer) = channel_with_peer();
        channel.set_file(storage.open("/f", OpenMode::Write).unwrap());
        channel.allocate_buffer(64);

        channel.close_transfer();
        assert!(!channel.has_buffer());
        assert!(!channel.has_file());
        channel.close_transfer();
        assert!(!channel.has_buffer());
        assert!(!channel.is_data_connected());
    }
}
