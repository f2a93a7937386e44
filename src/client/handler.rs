//! Module `handler`
//!
//! The FTP client engine: one upload or download per session, driven
//! through `Connect → Greet → User → Password → Passive → DataConnect →
//! Transfer → Finish → Quit → Idle` by repeated calls to [`FtpClient::tick`].

use log::{debug, info, warn};
use std::net::{SocketAddr, SocketAddrV4, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use crate::client::results::{Status, TransferResult};
use crate::client::session::Credentials;
use crate::client::state::{ClientState, Direction};
use crate::error::ClientError;
use crate::storage::{OpenMode, Storage};
use crate::transfer::{Connection, DataChannel, TransferFailure, parse_address_tuple};
use crate::utils::Deadline;
use crate::utils::network::ipv4_of;

const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_BUFFER_SIZE: usize = 1460;
const BLOCKING_POLL: Duration = Duration::from_millis(25);

pub struct FtpClient<S: Storage> {
    storage: S,
    server: Option<Credentials>,
    pub(crate) state: ClientState,
    pub(crate) status: Status,
    pub(crate) control: Connection,
    channel: DataChannel,
    /// Reply line being assembled.
    pub(crate) reply_line: String,
    pub(crate) timeout: Deadline,
    pub(crate) reply_timeout: Duration,
    buffer_size: usize,
    remote_file: String,
    direction: Direction,
    data_addr: Option<SocketAddrV4>,
}

impl<S: Storage> FtpClient<S> {
    /// A client transferring from and to `storage`.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            server: None,
            state: ClientState::Idle,
            status: Status::default(),
            control: Connection::default(),
            channel: DataChannel::new(),
            reply_line: String::new(),
            timeout: Deadline::never(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            remote_file: String::new(),
            direction: Direction::default(),
            data_addr: None,
        }
    }

    /// Sets the server to talk to. Must be called before `transfer`.
    pub fn begin(&mut self, server: Credentials) {
        self.server = Some(server);
    }

    /// How long to wait for each server reply and for connections.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.reply_timeout = timeout;
    }

    pub fn set_buffer_size(&mut self, size: usize) {
        self.buffer_size = size;
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Bytes moved over the data connection in the current or last session.
    pub fn bytes_transferred(&self) -> u64 {
        self.channel.bytes_transferred()
    }

    /// Current status, without side effects.
    pub fn check(&self) -> &Status {
        &self.status
    }

    /// Starts a session moving `local` to/from `remote`.
    ///
    /// Blocking directions return only once the session has ended.
    /// Non-blocking ones run the connect step and return; the caller then
    /// calls [`FtpClient::tick`] until `check()` leaves `InProgress`.
    pub fn transfer(&mut self, local: &str, remote: &str, direction: Direction) -> &Status {
        self.status.result = TransferResult::InProgress;
        if !self.state.is_ready() {
            self.status.code = ClientError::AlreadyInProgress.code();
            return &self.status;
        }

        self.teardown();
        self.remote_file = remote.to_string();
        self.direction = direction;

        let mode = if direction.is_put() {
            OpenMode::Read
        } else {
            OpenMode::Write
        };
        match self.storage.open(local, mode) {
            Ok(file) => self.channel.set_file(file),
            Err(e) => {
                warn!("Cannot open local file '{}': {}", local, e);
                self.status.fail(ClientError::LocalFile);
                return &self.status;
            }
        }

        self.state = ClientState::Connect;
        if direction.is_blocking() {
            while self.state <= ClientState::Quit {
                self.tick();
                thread::sleep(BLOCKING_POLL);
            }
        } else {
            self.tick();
        }
        &self.status
    }

    /// Advances the session by one step.
    pub fn tick(&mut self) {
        let Some(server) = self.server.clone() else {
            self.status.fail(ClientError::Uninitialized);
            self.enter_failure(ClientState::Error);
            return;
        };

        match self.state {
            ClientState::Timeout | ClientState::Error => {
                self.status.result = TransferResult::Error;
            }
            ClientState::Connect => {
                if server.validate_ca {
                    debug!("Ignoring CA verification - FTP only");
                }
                self.status.code = ClientError::ConnectionFailed.code();
                self.status.desc = ClientError::ConnectionFailed.to_string();
                match self.connect_control(&server.host, server.port) {
                    Some(addr) => {
                        info!("Connection to {} established", addr);
                        self.status.result = TransferResult::InProgress;
                        self.state = ClientState::Greet;
                    }
                    None => self.enter_failure(ClientState::Error),
                }
            }
            ClientState::Greet => {
                if self.wait_for(220, Some("No server greeting")) {
                    let cmd = format!("USER {}", server.login);
                    self.send_command(&cmd);
                    self.state = ClientState::User;
                }
            }
            ClientState::User => {
                if self.wait_for(331, None) {
                    let cmd = format!("PASS {}", server.password);
                    self.send_command(&cmd);
                    self.state = ClientState::Password;
                }
            }
            ClientState::Password => {
                if self.wait_for(230, None) {
                    self.send_command("PASV");
                    self.state = ClientState::Passive;
                }
            }
            ClientState::Passive => {
                if self.wait_for(227, None) {
                    match self.passive_address() {
                        Some(addr) => {
                            self.data_addr = Some(addr);
                            self.state = ClientState::DataConnect;
                        }
                        None => {
                            self.status.fail(ClientError::ServerResponse);
                            self.enter_failure(ClientState::Error);
                        }
                    }
                }
            }
            ClientState::DataConnect => self.data_connect(),
            ClientState::Transfer => self.transfer_step(),
            ClientState::Finish => {
                debug!(
                    "Transfer done: {} bytes in {} ms",
                    self.channel.bytes_transferred(),
                    self.channel.elapsed().as_millis()
                );
                self.channel.close_transfer();
                self.state = ClientState::Quit;
            }
            ClientState::Quit => {
                self.send_command("QUIT");
                self.status.result = TransferResult::Ok;
                self.state = ClientState::Idle;
            }
            ClientState::Idle => self.control.close(),
        }
    }

    fn connect_control(&mut self, host: &str, port: u16) -> Option<SocketAddr> {
        let addrs = match (host, port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                warn!("Cannot resolve {}:{}: {}", host, port, e);
                return None;
            }
        };
        for addr in addrs {
            match Connection::connect(addr, self.reply_timeout) {
                Ok(conn) => {
                    self.control = conn;
                    return Some(addr);
                }
                Err(e) => debug!("Connection to {} failed: {}", addr, e),
            }
        }
        warn!("Connection to {}:{} failed", host, port);
        None
    }

    /// The `(h1,h2,h3,h4,p1,p2)` tuple of the last 227 reply. An all-zero
    /// address means "same host as the control connection".
    fn passive_address(&self) -> Option<SocketAddrV4> {
        let desc = &self.status.desc;
        let open = desc.find('(')?;
        let close = desc[open..].find(')')? + open;
        debug!("Parsing PASV response {}", desc);

        let addr = parse_address_tuple(&desc[open + 1..close])?;
        if addr.ip().is_unspecified() {
            let peer = self.control.peer_addr()?;
            return Some(SocketAddrV4::new(ipv4_of(peer.ip()), addr.port()));
        }
        Some(addr)
    }

    fn data_connect(&mut self) {
        let Some(addr) = self.data_addr else {
            self.status.fail(ClientError::DataConnectionFailed);
            self.enter_failure(ClientState::Error);
            return;
        };
        if !self.channel.open_data_connection(addr, self.reply_timeout) {
            self.status.fail(ClientError::DataConnectionFailed);
            self.enter_failure(ClientState::Error);
            return;
        }

        debug!("Data connection to {} established", addr);
        self.channel.begin();
        if self.channel.allocate_buffer(self.buffer_size) == 0 {
            self.status.fail(ClientError::Memory);
            self.enter_failure(ClientState::Error);
            return;
        }

        let verb = if self.direction.is_put() { "STOR" } else { "RETR" };
        let cmd = format!("{} {}", verb, self.remote_file);
        self.send_command(&cmd);
        self.state = ClientState::Transfer;
    }

    /// One pump call, watching the control connection for a rejection and
    /// giving up once no byte has moved for the reply timeout.
    fn transfer_step(&mut self) {
        if let Some((code, line)) = self.poll_reply() {
            if code >= 400 {
                warn!("Transfer rejected by server: {}", line);
                self.status.code = code;
                self.status.desc = line;
                self.enter_failure(ClientState::Error);
                return;
            }
            debug!("Server: {}", line);
        }

        let before = self.channel.bytes_transferred();
        let moved = if self.direction.is_put() {
            self.channel.pump_file_to_network()
        } else {
            self.channel.pump_network_to_file()
        };

        if let Some(failure) = self.channel.failure() {
            let error = match failure {
                TransferFailure::Network => ClientError::DataConnectionFailed,
                TransferFailure::File => ClientError::LocalFile,
            };
            self.status.fail(error);
            self.enter_failure(ClientState::Error);
            return;
        }
        if !moved || !self.channel.is_data_connected() {
            self.timeout.reset_to_never();
            self.state = ClientState::Finish;
            return;
        }

        if self.channel.bytes_transferred() != before || !self.timeout.can_expire() {
            self.timeout.reset(self.reply_timeout);
        } else if self.timeout.expired() {
            warn!(
                "No transfer progress for {:?} after {} bytes",
                self.reply_timeout, before
            );
            self.status.code = ClientError::Timeout.code();
            self.status.desc = "No transfer progress".to_string();
            self.enter_failure(ClientState::Timeout);
        }
    }

    /// Moves to `Timeout` or `Error` and releases everything the session
    /// holds. `status` is expected to be filled in already.
    pub(crate) fn enter_failure(&mut self, state: ClientState) {
        self.status.result = TransferResult::Error;
        self.state = state;
        self.teardown();
    }

    fn teardown(&mut self) {
        self.channel.close_transfer();
        self.control.close();
        self.reply_line.clear();
        self.timeout.reset_to_never();
        self.data_addr = None;
    }
}
