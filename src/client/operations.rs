//! Control connection operations of the client engine

use log::{debug, warn};

use crate::client::handler::FtpClient;
use crate::client::state::ClientState;
use crate::error::ClientError;
use crate::middleware::logging::loggable_params;
use crate::protocol::responses::reply_code;
use crate::storage::Storage;

impl<S: Storage> FtpClient<S> {
    /// Sends one command line.
    pub(crate) fn send_command(&mut self, cmd: &str) {
        let (token, params) = cmd.split_once(' ').unwrap_or((cmd, ""));
        debug!(">>> {} {}", token, loggable_params(token, params));
        if let Err(e) = self.control.write_all(format!("{}\r\n", cmd).as_bytes()) {
            warn!("Failed to send {}: {}", token, e);
        }
    }

    /// Waits for a reply carrying `expected`.
    ///
    /// The first call only arms the reply timer. Later calls consume input
    /// up to the first complete non-blank line; its code decides between
    /// success and `Error`. Without a line before the timer runs out the
    /// session goes to `Timeout`, described by `timeout_desc`.
    pub(crate) fn wait_for(&mut self, expected: i16, timeout_desc: Option<&str>) -> bool {
        if !self.timeout.can_expire() {
            self.timeout.reset(self.reply_timeout);
            self.reply_line.clear();
            return false;
        }

        if self.timeout.expired() {
            debug!("Waiting for code {} - timeout!", expected);
            self.status.code = ClientError::Timeout.code();
            self.status.desc = timeout_desc
                .map(str::to_string)
                .unwrap_or_else(|| ClientError::Timeout.to_string());
            self.enter_failure(ClientState::Timeout);
            return false;
        }

        if let Some((code, line)) = self.poll_reply() {
            self.timeout.reset_to_never();
            self.status.code = code;
            self.status.desc = line;
            if self.status.code == expected {
                debug!("Waiting for code {} success: {}", expected, self.status.desc);
                return true;
            }
            warn!(
                "Waiting for code {} but server replies: {}",
                expected, self.status.desc
            );
            self.enter_failure(ClientState::Error);
            return false;
        }

        if !self.control.is_connected() {
            warn!("Control connection lost waiting for code {}", expected);
            self.status.fail(ClientError::ConnectionFailed);
            self.enter_failure(ClientState::Error);
        }
        false
    }

    /// The next complete, non-blank reply line and its code, if one has
    /// arrived. Never waits.
    pub(crate) fn poll_reply(&mut self) -> Option<(i16, String)> {
        while let Some(byte) = self.control.read_byte() {
            if byte != b'\r' && byte != b'\n' {
                self.reply_line.push(char::from(byte));
                continue;
            }

            let line = self.reply_line.trim().to_string();
            self.reply_line.clear();
            if !line.is_empty() {
                return Some((reply_code(&line).unwrap_or(0), line));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::transfer::Connection;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Duration;

    fn client_with_peer() -> (FtpClient<MemoryStorage>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let peer = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, _) = listener.accept().unwrap();

        let mut client = FtpClient::new(MemoryStorage::new());
        client.control = Connection::from_stream(stream).unwrap();
        client.state = ClientState::Greet;
        (client, peer)
    }

    fn wait_until_done(client: &mut FtpClient<MemoryStorage>, expected: i16) -> bool {
        for _ in 0..200 {
            if client.wait_for(expected, None) {
                return true;
            }
            if client.state != ClientState::Greet {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_first_call_only_arms_timer() {
        let (mut client, mut peer) = client_with_peer();
        peer.write_all(b"220 hello\r\n").unwrap();
        thread::sleep(Duration::from_millis(20));

        assert!(!client.wait_for(220, None));
        assert!(client.timeout.can_expire());
        assert!(wait_until_done(&mut client, 220));
        assert_eq!(client.status.code, 220);
        assert_eq!(client.status.desc, "220 hello");
        assert!(!client.timeout.can_expire());
    }

    #[test]
    fn test_blank_lines_skipped_and_mismatch_fails() {
        let (mut client, mut peer) = client_with_peer();
        peer.write_all(b"\r\n\r\n530 go away\r\n").unwrap();

        assert!(!wait_until_done(&mut client, 331));
        assert_eq!(client.state, ClientState::Error);
        assert_eq!(client.status.code, 530);
    }

    #[test]
    fn test_timeout_sets_description() {
        let (mut client, _peer) = client_with_peer();
        client.reply_timeout = Duration::from_millis(10);

        assert!(!client.wait_for(220, Some("No server greeting")));
        thread::sleep(Duration::from_millis(30));
        assert!(!client.wait_for(220, Some("No server greeting")));

        assert_eq!(client.state, ClientState::Timeout);
        assert_eq!(client.status.failure(), Some(ClientError::Timeout));
        assert_eq!(client.status.desc, "No server greeting");
    }
}
