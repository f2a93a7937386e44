//! Command handlers module for the tickftp server.
//!
//! One handler per FTP command. Each runs against the current session and
//! the storage backend and reports back a [`CommandStatus`]; handlers that
//! need a data connection return `Pending` until it is established.

use chrono::Utc;
use log::{debug, info, warn};
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};
use std::time::Duration;

use crate::auth::{ServerCredentials, validate_password, validate_user};
use crate::error::StorageError;
use crate::error::handlers::storage_error_to_ftp_code;
use crate::middleware::logging::loggable_params;
use crate::navigate::{resolve_directory, resolve_path};
use crate::protocol::commands::{Command, CommandStatus, ParsedCommand};
use crate::protocol::listing::{ListFormat, format_entry, format_mlsd_time, strip_list_options};
use crate::protocol::responses::*;
use crate::server::session::{Session, TransferState};
use crate::storage::{FileHandle, OpenMode, Storage};
use crate::transfer::{DataConnectState, DataMode, format_address_tuple, parse_address_tuple};
use crate::utils::network::ipv4_of;

/// Everything a handler may touch while running one command.
pub struct CommandContext<'a> {
    pub session: &'a mut Session,
    pub storage: &'a dyn Storage,
    pub credentials: &'a ServerCredentials,
    pub data_listener: Option<&'a TcpListener>,
    pub buffer_size: usize,
    pub data_connect_timeout: Duration,
}

/// Dispatches a received FTP command to its corresponding handler.
pub fn handle_command(ctx: &mut CommandContext<'_>, cmd: &ParsedCommand) -> CommandStatus {
    let params = cmd.params.as_str();
    let path = resolve_path(&ctx.session.cwd, params);
    debug!(
        "Processing {} [{}] (cwd '{}')",
        cmd.token,
        loggable_params(&cmd.token, params),
        ctx.session.cwd
    );

    match cmd.command {
        Command::USER => handle_cmd_user(ctx, params),
        Command::PASS => handle_cmd_pass(ctx, params),
        Command::QUIT => handle_cmd_quit(ctx),
        Command::NOOP => reply(ctx, OK, "Zzz..."),
        Command::CDUP => handle_cmd_cdup(ctx),
        Command::CWD => handle_cmd_cwd(ctx, params, path),
        Command::PWD => {
            let msg = format!("\"{}\" is the current directory.", ctx.session.cwd);
            reply(ctx, PATH_CREATED, &msg)
        }
        Command::MODE => handle_cmd_mode(ctx, params),
        Command::STRU => handle_cmd_stru(ctx, params),
        Command::TYPE => handle_cmd_type(ctx, params),
        Command::PASV => handle_cmd_pasv(ctx),
        Command::PORT => handle_cmd_port(ctx, params),
        Command::ABOR => {
            ctx.session.abort_transfer();
            reply(ctx, TRANSFER_COMPLETE, "Data connection closed")
        }
        Command::DELE => handle_cmd_dele(ctx, params, &path),
        Command::LIST => handle_cmd_list(ctx, params, ListFormat::List),
        Command::NLST => handle_cmd_list(ctx, params, ListFormat::Nlst),
        Command::MLSD => handle_cmd_list(ctx, params, ListFormat::Mlsd),
        Command::RETR => handle_cmd_retr(ctx, params, &path),
        Command::STOR => handle_cmd_stor(ctx, params, &path),
        Command::MKD => handle_cmd_mkd(ctx, &path),
        Command::RMD => handle_cmd_rmd(ctx, &path),
        Command::RNFR => handle_cmd_rnfr(ctx, params, path),
        Command::RNTO => handle_cmd_rnto(ctx, params, &path),
        Command::FEAT => {
            ctx.session.send_raw(features());
            CommandStatus::Unaccepted
        }
        Command::MDTM => handle_cmd_mdtm(ctx, params, &path),
        Command::SIZE => handle_cmd_size(ctx, params, &path),
        Command::SITE => {
            let msg = format!("SITE {} command not implemented.", params);
            reply(ctx, FILE_NOT_FOUND, &msg)
        }
        Command::SYST => reply(ctx, SYSTEM_TYPE, "UNIX Type: L8"),
        Command::UNKNOWN => {
            debug!("Unknown command: {}, params: '{}'", cmd.token, params);
            let msg = format!("unknown command \"{}\"", cmd.token);
            reply(ctx, SYNTAX_ERROR, &msg)
        }
    }
}

fn reply(ctx: &mut CommandContext<'_>, code: u16, message: &str) -> CommandStatus {
    ctx.session.reply(code, message);
    CommandStatus::Completed
}

/// Handles USER. On success the login sequence decides the reply.
fn handle_cmd_user(ctx: &mut CommandContext<'_>, username: &str) -> CommandStatus {
    if ctx.session.logged_in {
        return reply(ctx, LOGIN_SUCCESS, "Already logged in.");
    }
    match validate_user(username, ctx.credentials) {
        Ok(()) => {
            debug!("USER ok");
            CommandStatus::Completed
        }
        Err(e) => {
            info!("Login rejected: {}", e);
            ctx.session.reply(INVALID_CREDENTIALS, "User not found.");
            CommandStatus::Unaccepted
        }
    }
}

fn handle_cmd_pass(ctx: &mut CommandContext<'_>, password: &str) -> CommandStatus {
    if ctx.session.logged_in {
        return reply(ctx, LOGIN_SUCCESS, "Already logged in.");
    }
    match validate_password(password, ctx.credentials) {
        Ok(()) => {
            debug!("PASS ok");
            CommandStatus::Completed
        }
        Err(e) => {
            info!("Login rejected: {}", e);
            ctx.session.reply(INVALID_CREDENTIALS, "Password invalid.");
            CommandStatus::Unaccepted
        }
    }
}

/// Handles QUIT, waiting for a running transfer to finish first.
fn handle_cmd_quit(ctx: &mut CommandContext<'_>) -> CommandStatus {
    if ctx.session.transfer != TransferState::Idle {
        return CommandStatus::Pending;
    }
    ctx.session.disconnect(true);
    CommandStatus::CloseConnection
}

fn handle_cmd_cdup(ctx: &mut CommandContext<'_>) -> CommandStatus {
    ctx.session.cwd = resolve_directory(&ctx.session.cwd, "");
    let msg = format!("Directory successfully changed to \"{}\".", ctx.session.cwd);
    reply(ctx, FILE_ACTION_OK, &msg)
}

fn handle_cmd_cwd(ctx: &mut CommandContext<'_>, params: &str, path: String) -> CommandStatus {
    match params {
        "." => CommandStatus::Alias(ParsedCommand::new("PWD", "")),
        ".." => CommandStatus::Alias(ParsedCommand::new("CDUP", "")),
        _ => match ctx.storage.metadata(&path) {
            Ok(meta) if meta.is_dir => {
                ctx.session.cwd = path;
                reply(ctx, FILE_ACTION_OK, "Directory successfully changed.")
            }
            _ => reply(ctx, FILE_NOT_FOUND, "Failed to change directory."),
        },
    }
}

/// First parameter token, upper-cased.
fn first_token(params: &str) -> String {
    params
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

fn handle_cmd_mode(ctx: &mut CommandContext<'_>, params: &str) -> CommandStatus {
    if first_token(params) == "S" {
        reply(ctx, OK, "Mode set to S.")
    } else {
        reply(ctx, NOT_IMPLEMENTED_FOR_PARAM, "Only S(tream) mode is supported")
    }
}

fn handle_cmd_stru(ctx: &mut CommandContext<'_>, params: &str) -> CommandStatus {
    if first_token(params) == "F" {
        reply(ctx, OK, "Structure set to F.")
    } else {
        reply(ctx, NOT_IMPLEMENTED_FOR_PARAM, "Only F(ile) is supported")
    }
}

fn handle_cmd_type(ctx: &mut CommandContext<'_>, params: &str) -> CommandStatus {
    match first_token(params).as_str() {
        "A" => reply(ctx, OK, "TYPE is now ASCII."),
        "I" => reply(ctx, OK, "TYPE is now 8-bit Binary."),
        _ => reply(ctx, NOT_IMPLEMENTED_FOR_PARAM, "Unrecognised TYPE."),
    }
}

/// Handles PASV: advertises the control connection's local address and the
/// passive listener's port.
fn handle_cmd_pasv(ctx: &mut CommandContext<'_>) -> CommandStatus {
    ctx.session.channel.close_data();
    ctx.session.mode = DataMode::Passive;

    // connections queued before this PASV belong to an earlier command
    if let Some(listener) = ctx.data_listener {
        while let Ok((_, peer)) = listener.accept() {
            debug!("Dropping stale data connection from {}", peer);
        }
    }

    let ip = ctx
        .session
        .control
        .local_addr()
        .map(|a| ipv4_of(a.ip()))
        .unwrap_or(Ipv4Addr::UNSPECIFIED);
    let port = ctx
        .data_listener
        .and_then(|l| l.local_addr().ok())
        .map_or(0, |a| a.port());

    let msg = format!(
        "Entering Passive Mode ({}).",
        format_address_tuple(SocketAddrV4::new(ip, port))
    );
    reply(ctx, ENTERING_PASSIVE, &msg)
}

fn handle_cmd_port(ctx: &mut CommandContext<'_>, params: &str) -> CommandStatus {
    ctx.session.channel.close_data();
    match parse_address_tuple(params) {
        Some(addr) => {
            ctx.session.mode = DataMode::Active(addr);
            debug!("Data connection management Active, using {}", addr);
            reply(ctx, OK, "PORT command successful")
        }
        None => reply(ctx, ARGUMENT_ERROR, "Cannot interpret parameters."),
    }
}

fn handle_cmd_dele(ctx: &mut CommandContext<'_>, params: &str, path: &str) -> CommandStatus {
    if params.is_empty() {
        return reply(ctx, ARGUMENT_ERROR, "No file name");
    }
    if !ctx.storage.exists(path) {
        let msg = format!("Delete operation failed, file '{}' not found.", path);
        return reply(ctx, FILE_NOT_FOUND, &msg);
    }
    match ctx.storage.remove(path) {
        Ok(()) => reply(ctx, FILE_ACTION_OK, "Delete operation successful."),
        Err(e) => {
            warn!("Delete of '{}' failed: {}", path, e);
            reply(ctx, FILE_UNAVAILABLE, "Delete operation failed.")
        }
    }
}

/// Establishes the data connection for the current mode.
///
/// Passive mode gives the peer `data_connect_timeout` to connect before
/// the attempt counts as failed.
fn data_connect(ctx: &mut CommandContext<'_>) -> DataConnectState {
    let state = match ctx.session.mode {
        DataMode::Active(addr) => {
            if ctx
                .session
                .channel
                .open_data_connection(addr, ctx.data_connect_timeout)
            {
                DataConnectState::Ready
            } else {
                DataConnectState::Failed
            }
        }
        DataMode::Passive => ctx.session.channel.accept_or_retry(ctx.data_listener),
    };

    let deadline = &mut ctx.session.data_deadline;
    match state {
        DataConnectState::NotReady if !deadline.can_expire() => {
            deadline.reset(ctx.data_connect_timeout);
            DataConnectState::NotReady
        }
        DataConnectState::NotReady if deadline.expired() => {
            deadline.reset_to_never();
            DataConnectState::Failed
        }
        other => {
            if other != DataConnectState::NotReady {
                deadline.reset_to_never();
            }
            other
        }
    }
}

fn handle_cmd_list(ctx: &mut CommandContext<'_>, params: &str, format: ListFormat) -> CommandStatus {
    match data_connect(ctx) {
        DataConnectState::NotReady => return CommandStatus::Pending,
        DataConnectState::Failed => {
            ctx.session.reply(CANT_OPEN_DATA, "No data connection");
        }
        DataConnectState::Ready => {
            ctx.session.reply(FILE_STATUS_OKAY, "Accepted data connection");

            let path = resolve_path(&ctx.session.cwd, strip_list_options(params));
            debug!("Listing content of '{}'", path);
            let entries = ctx.storage.list(&path).unwrap_or_else(|e| {
                warn!("Cannot list '{}': {}", path, e);
                Vec::new()
            });

            let now = Utc::now();
            let mut listing = String::new();
            for entry in &entries {
                listing.push_str(&format_entry(format, entry, now));
            }
            if let Err(e) = ctx
                .session
                .channel
                .data_connection()
                .write_all(listing.as_bytes())
            {
                warn!("Failed to send listing: {}", e);
            }

            if format == ListFormat::Mlsd {
                ctx.session.send_raw("226-options: -a -l\r\n");
            }
            let msg = format!("{} matches total", entries.len());
            ctx.session.reply(TRANSFER_COMPLETE, &msg);
        }
    }
    ctx.session.channel.close_data();
    CommandStatus::Completed
}

/// Allocates the transfer buffer and enters `state`, or gives up the
/// transfer with a 451.
fn start_transfer(ctx: &mut CommandContext<'_>, state: TransferState) -> bool {
    ctx.session.channel.begin();
    if ctx.session.channel.allocate_buffer(ctx.buffer_size) == 0 {
        ctx.session.channel.close_transfer();
        ctx.session.reply(LOCAL_ERROR, "Internal error. Not enough memory.");
        return false;
    }
    ctx.session.transfer = state;
    true
}

fn handle_cmd_retr(ctx: &mut CommandContext<'_>, params: &str, path: &str) -> CommandStatus {
    if params.is_empty() {
        return reply(ctx, ARGUMENT_ERROR, "No file name");
    }

    // the file stays open while the data connection is awaited
    if !ctx.session.channel.has_file() {
        match ctx.storage.metadata(path) {
            Err(_) => {
                let msg = format!("File \"{}\" not found.", params);
                return reply(ctx, FILE_NOT_FOUND, &msg);
            }
            Ok(meta) if meta.is_dir => {
                let msg = format!("Cannot open file \"{}\".", params);
                return reply(ctx, FILE_UNAVAILABLE, &msg);
            }
            Ok(_) => {}
        }
        match ctx.storage.open(path, OpenMode::Read) {
            Ok(file) => ctx.session.channel.set_file(file),
            Err(e) => {
                let code = storage_error_to_ftp_code(&e);
                let msg = format!("Cannot open file \"{}\".", params);
                return reply(ctx, code, &msg);
            }
        }
    }

    match data_connect(ctx) {
        DataConnectState::NotReady => CommandStatus::Pending,
        DataConnectState::Failed => {
            ctx.session.channel.close_transfer();
            reply(ctx, CANT_OPEN_DATA, "No data connection")
        }
        DataConnectState::Ready => {
            let size = ctx.session.channel.file_size();
            if start_transfer(ctx, TransferState::Retrieving) {
                info!("Sending file '{}' ({} bytes)", path, size);
                let msg = format!("{} bytes to download", size);
                ctx.session.reply(FILE_STATUS_OKAY, &msg);
            }
            CommandStatus::Completed
        }
    }
}

/// Opens `path` for an upload: truncate first, then reopen for appending so
/// the space of the old content is released before writing starts.
fn open_for_upload(storage: &dyn Storage, path: &str) -> Result<Box<dyn FileHandle>, StorageError> {
    drop(storage.open(path, OpenMode::Write)?);
    storage.open(path, OpenMode::Append)
}

fn handle_cmd_stor(ctx: &mut CommandContext<'_>, params: &str, path: &str) -> CommandStatus {
    if params.is_empty() {
        return reply(ctx, ARGUMENT_ERROR, "No file name.");
    }

    if !ctx.session.channel.has_file() {
        match open_for_upload(ctx.storage, path) {
            Ok(file) => ctx.session.channel.set_file(file),
            Err(e) => {
                warn!("Cannot open '{}' for writing: {}", path, e);
                let msg = format!("Cannot open/create \"{}\"", path);
                return reply(ctx, LOCAL_ERROR, &msg);
            }
        }
    }

    match data_connect(ctx) {
        DataConnectState::NotReady => CommandStatus::Pending,
        DataConnectState::Failed => {
            ctx.session.channel.close_transfer();
            reply(ctx, CANT_OPEN_DATA, "No data connection")
        }
        DataConnectState::Ready => {
            if start_transfer(ctx, TransferState::Storing) {
                info!("Receiving file '{}' => {}", params, path);
                let port = ctx
                    .session
                    .channel
                    .data_connection()
                    .local_addr()
                    .map_or(0, |a| a.port());
                let msg = format!("Connected to port {}", port);
                ctx.session.reply(FILE_STATUS_OKAY, &msg);
            }
            CommandStatus::Completed
        }
    }
}

fn handle_cmd_mkd(ctx: &mut CommandContext<'_>, path: &str) -> CommandStatus {
    debug!("mkdir({})", path);
    match ctx.storage.mkdir(path) {
        Ok(()) => {
            let msg = format!("\"{}\" created.", path);
            reply(ctx, PATH_CREATED, &msg)
        }
        Err(e) => {
            warn!("mkdir '{}' failed: {}", path, e);
            reply(ctx, FILE_NOT_FOUND, "Create directory operation failed.")
        }
    }
}

fn handle_cmd_rmd(ctx: &mut CommandContext<'_>, path: &str) -> CommandStatus {
    match ctx.storage.rmdir(path) {
        Ok(()) => reply(ctx, FILE_ACTION_OK, "Remove directory operation successful."),
        Err(StorageError::NotEmpty(_)) => reply(
            ctx,
            FILE_NOT_FOUND,
            "Remove directory operation failed, directory is not empty.",
        ),
        Err(e) => {
            warn!("rmdir '{}' failed: {}", path, e);
            reply(ctx, FILE_NOT_FOUND, "Remove directory operation failed.")
        }
    }
}

fn handle_cmd_rnfr(ctx: &mut CommandContext<'_>, params: &str, path: String) -> CommandStatus {
    if params.is_empty() {
        return reply(ctx, ARGUMENT_ERROR, "No file name");
    }
    if !ctx.storage.exists(&path) {
        let msg = format!("File \"{}\" not found.", path);
        return reply(ctx, FILE_NOT_FOUND, &msg);
    }
    let msg = format!(
        "RNFR accepted - file \"{}\" exists, ready for destination",
        path
    );
    ctx.session.rename_from = Some(path);
    reply(ctx, PENDING_FURTHER_INFO, &msg)
}

fn handle_cmd_rnto(ctx: &mut CommandContext<'_>, params: &str, path: &str) -> CommandStatus {
    let Some(from) = ctx.session.rename_from.take() else {
        return reply(ctx, BAD_SEQUENCE, "Need RNFR before RNTO");
    };
    if params.is_empty() {
        return reply(ctx, ARGUMENT_ERROR, "No file name");
    }
    if ctx.storage.exists(path) {
        let msg = format!("\"{}\" already exists.", params);
        return reply(ctx, NAME_NOT_ALLOWED, &msg);
    }

    debug!("Renaming '{}' to '{}'", from, path);
    match ctx.storage.rename(&from, path) {
        Ok(()) => reply(ctx, FILE_ACTION_OK, "File successfully renamed or moved"),
        Err(e) => {
            warn!("Rename '{}' -> '{}' failed: {}", from, path, e);
            reply(ctx, LOCAL_ERROR, "Rename/move failure.")
        }
    }
}

fn handle_cmd_mdtm(ctx: &mut CommandContext<'_>, params: &str, path: &str) -> CommandStatus {
    match ctx.storage.metadata(path) {
        Ok(meta) if !params.is_empty() => {
            let time = format_mlsd_time(meta.modified);
            reply(ctx, FILE_STATUS, &time)
        }
        _ => reply(ctx, FILE_NOT_FOUND, "Unable to retrieve time"),
    }
}

fn handle_cmd_size(ctx: &mut CommandContext<'_>, params: &str, path: &str) -> CommandStatus {
    match ctx.storage.metadata(path) {
        Ok(meta) if !params.is_empty() && !meta.is_dir => {
            let size = meta.size.to_string();
            reply(ctx, FILE_STATUS, &size)
        }
        _ => reply(ctx, FILE_UNAVAILABLE, "Cannot open file."),
    }
}
