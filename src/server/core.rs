use log::{debug, info, warn};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};

use crate::auth::ServerCredentials;
use crate::config::ServerConfig;
use crate::error::FtpServerError;
use crate::middleware::logging::{
    log_command, log_connection, log_disconnect, loggable_params,
};
use crate::protocol::commands::{Command, CommandStatus, ParsedCommand};
use crate::protocol::handlers::{CommandContext, handle_command};
use crate::protocol::parser::ReadEvent;
use crate::protocol::responses::{
    AUTH_FAILED, LOGIN_SUCCESS, PASSWORD_REQUIRED, READY, SYNTAX_ERROR,
};
use crate::server::session::{Session, TransferState};
use crate::storage::Storage;
use crate::transfer::Connection;
use crate::utils::Deadline;

const GREETING: &str = concat!("(tickftp ", env!("CARGO_PKG_VERSION"), ")");

/// Control connection states, in the order a session walks through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ControlState {
    /// Tear down the previous session.
    Init,
    /// Waiting for a client to connect.
    Wait,
    /// Connected; greeting not sent yet.
    Check,
    UserId,
    Password,
    LoginOk,
    Process,
}

/// The FTP server engine.
///
/// Serves one control session at a time. Nothing blocks: the host calls
/// [`Server::tick`] repeatedly and each call advances the control state
/// machine and the running transfer by one step.
pub struct Server<S: Storage> {
    config: ServerConfig,
    storage: S,
    credentials: ServerCredentials,
    control_listener: Option<TcpListener>,
    data_listener: Option<TcpListener>,
    state: ControlState,
    session: Session,
    timeout: Deadline,
}

impl<S: Storage> Server<S> {
    pub fn new(config: ServerConfig, storage: S) -> Self {
        let session = Session::new(config.max_command_length, config.max_block());
        Self {
            config,
            storage,
            credentials: ServerCredentials::default(),
            control_listener: None,
            data_listener: None,
            state: ControlState::Init,
            session,
            timeout: Deadline::never(),
        }
    }

    /// Binds the control and passive listeners and arms the engine.
    ///
    /// Empty `username`/`password` skip the respective login step.
    pub fn begin(&mut self, username: &str, password: &str) -> Result<(), FtpServerError> {
        self.stop();
        self.credentials = ServerCredentials::new(username, password);

        let control_socket = self.config.control_socket();
        let control = bind_listener(&control_socket)?;
        let passive_socket = self.config.passive_socket();
        let data = bind_listener(&passive_socket)?;

        info!(
            "FTP server listening on {} (passive data on {})",
            control.local_addr()?,
            data.local_addr()?
        );
        self.control_listener = Some(control);
        self.data_listener = Some(data);
        self.state = ControlState::Init;
        Ok(())
    }

    /// Drops the current session and releases both listeners.
    pub fn stop(&mut self) {
        if self.session.control.is_open() {
            self.disconnect_client(false);
        }
        self.session.reset();
        self.control_listener = None;
        self.data_listener = None;
        self.state = ControlState::Init;
        self.timeout.reset_to_never();
    }

    pub fn control_addr(&self) -> Option<SocketAddr> {
        self.control_listener
            .as_ref()
            .and_then(|l| l.local_addr().ok())
    }

    pub fn passive_addr(&self) -> Option<SocketAddr> {
        self.data_listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Runs one step of the control state machine and the transfer pump.
    pub fn tick(&mut self) {
        if self.control_listener.is_none() {
            return;
        }

        match self.state {
            ControlState::Init => {
                if self.session.control.is_open() {
                    self.disconnect_client(false);
                }
                self.session.reset();
                self.state = ControlState::Wait;
            }
            ControlState::Wait => self.accept_client(),
            ControlState::Check => {
                if self.session.control.is_connected() {
                    self.session.reply(READY, GREETING);
                    self.state = if self.credentials.requires_user() {
                        ControlState::UserId
                    } else if self.credentials.requires_password() {
                        ControlState::Password
                    } else {
                        ControlState::LoginOk
                    };
                }
            }
            ControlState::LoginOk => {
                self.session.reply(LOGIN_SUCCESS, "Login successful.");
                self.session.logged_in = true;
                info!("Client logged in");
                self.timeout.reset(self.config.idle_timeout());
                self.state = ControlState::Process;
            }
            ControlState::UserId | ControlState::Password | ControlState::Process => {
                if let Some(cmd) = self.next_command() {
                    self.run_command(cmd);
                }
            }
        }

        if self.state >= ControlState::Check {
            self.supervise();
        }
    }

    fn accept_client(&mut self) {
        let Some(listener) = self.control_listener.as_ref() else {
            return;
        };
        match listener.accept() {
            Ok((stream, peer)) => match Connection::from_stream(stream) {
                Ok(conn) => {
                    self.session.control = conn;
                    log_connection(Some(peer));
                    self.timeout.reset(self.config.login_timeout());
                    self.state = ControlState::Check;
                }
                Err(e) => warn!("Failed to set up control connection from {}: {}", peer, e),
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => warn!("Error accepting control connection: {}", e),
        }
    }

    /// The command being processed, or the next complete line from the
    /// control connection once the previous command is done.
    fn next_command(&mut self) -> Option<ParsedCommand> {
        if let Some(cmd) = &self.session.pending {
            return Some(cmd.clone());
        }
        while let Some(byte) = self.session.control.read_byte() {
            match self.session.reader.feed(byte) {
                Some(ReadEvent::Line(cmd)) => {
                    log_command(&cmd.token, &cmd.params);
                    self.session.pending = Some(cmd.clone());
                    return Some(cmd);
                }
                Some(ReadEvent::TooLong) => self.session.reply(SYNTAX_ERROR, "Line too long"),
                None => {}
            }
        }
        None
    }

    fn run_command(&mut self, cmd: ParsedCommand) {
        let expected = match self.state {
            ControlState::UserId => Some(Command::USER),
            ControlState::Password => Some(Command::PASS),
            _ => None,
        };
        if let Some(expected) = expected {
            if cmd.command != expected && cmd.command != Command::FEAT {
                debug!(
                    "Ignoring before login: {} [{}]",
                    cmd.token,
                    loggable_params(&cmd.token, &cmd.params)
                );
                self.session.reply(AUTH_FAILED, "Please login with USER and PASS.");
                self.session.pending = None;
                return;
            }
        }

        let status = {
            let mut ctx = CommandContext {
                session: &mut self.session,
                storage: &self.storage,
                credentials: &self.credentials,
                data_listener: self.data_listener.as_ref(),
                buffer_size: self.config.buffer_size,
                data_connect_timeout: self.config.data_connect_timeout(),
            };
            handle_command(&mut ctx, &cmd)
        };

        match status {
            CommandStatus::Completed => {
                self.session.pending = None;
                self.advance_login();
            }
            CommandStatus::Unaccepted => self.session.pending = None,
            CommandStatus::Pending => {}
            CommandStatus::Alias(next) => self.session.pending = Some(next),
            CommandStatus::CloseConnection => {
                self.session.pending = None;
                log_disconnect(None, "QUIT");
                self.state = ControlState::Init;
            }
        }
    }

    fn advance_login(&mut self) {
        match self.state {
            ControlState::UserId => {
                if self.credentials.requires_password() {
                    self.timeout.reset(self.config.login_timeout());
                    self.session
                        .reply(PASSWORD_REQUIRED, "Please specify the password.");
                    self.state = ControlState::Password;
                } else {
                    self.state = ControlState::LoginOk;
                }
            }
            ControlState::Password => self.state = ControlState::LoginOk,
            _ => self.timeout.reset(self.config.idle_timeout()),
        }
    }

    /// Connection loss, timeout and the transfer pump. Runs on every tick
    /// once a client is connected.
    fn supervise(&mut self) {
        if !self.session.control.is_connected() {
            log_disconnect(self.session.control.peer_addr(), "client lost or disconnected");
            self.state = ControlState::Init;
        }

        if self.timeout.expired() {
            info!("Control session timed out");
            self.session.reply(AUTH_FAILED, "Timeout.");
            self.timeout.reset_to_never();
            self.state = ControlState::Init;
        }

        match self.session.transfer {
            TransferState::Retrieving => {
                if !self.session.channel.pump_file_to_network() {
                    self.session.end_transfer();
                }
            }
            TransferState::Storing => {
                if !self.session.channel.pump_network_to_file() {
                    self.session.end_transfer();
                }
            }
            TransferState::Idle => {}
        }
    }

    /// Aborts any transfer and closes the control connection.
    pub fn disconnect_client(&mut self, gracious: bool) {
        self.session.disconnect(gracious);
    }
}

fn bind_listener(addr: &str) -> Result<TcpListener, FtpServerError> {
    let listener =
        TcpListener::bind(addr).map_err(|e| FtpServerError::Bind(addr.to_string(), e))?;
    listener
        .set_nonblocking(true)
        .map_err(|e| FtpServerError::Bind(addr.to_string(), e))?;
    Ok(listener)
}
