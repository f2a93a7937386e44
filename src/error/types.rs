//! Error types
//!
//! Defines domain-specific error types for the client engine, the storage
//! backends and the server host.

use std::fmt;
use std::io;

/// Failures surfaced by the client engine through its `Status`.
///
/// Each variant has a stable negative code so it can share the numeric
/// `Status::code` slot with positive FTP reply codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    LocalFile,
    AlreadyInProgress,
    ConnectionFailed,
    ServerResponse,
    DataConnectionFailed,
    Uninitialized,
    Timeout,
    Memory,
}

impl ClientError {
    pub fn code(self) -> i16 {
        match self {
            ClientError::LocalFile => -1,
            ClientError::AlreadyInProgress => -2,
            ClientError::ConnectionFailed => -3,
            ClientError::ServerResponse => -4,
            ClientError::DataConnectionFailed => -5,
            ClientError::Uninitialized => -6,
            ClientError::Timeout => -7,
            ClientError::Memory => -8,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            -1 => Some(ClientError::LocalFile),
            -2 => Some(ClientError::AlreadyInProgress),
            -3 => Some(ClientError::ConnectionFailed),
            -4 => Some(ClientError::ServerResponse),
            -5 => Some(ClientError::DataConnectionFailed),
            -6 => Some(ClientError::Uninitialized),
            -7 => Some(ClientError::Timeout),
            -8 => Some(ClientError::Memory),
            _ => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::LocalFile => write!(f, "Local file error"),
            ClientError::AlreadyInProgress => write!(f, "Transfer already in progress"),
            ClientError::ConnectionFailed => write!(f, "No connection to FTP server"),
            ClientError::ServerResponse => write!(f, "FTP server response not understood."),
            ClientError::DataConnectionFailed => write!(f, "No data connection to FTP server"),
            ClientError::Uninitialized => write!(f, "begin() not called"),
            ClientError::Timeout => write!(f, "timeout"),
            ClientError::Memory => write!(f, "No memory for transfer buffer"),
        }
    }
}

impl std::error::Error for ClientError {}

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    UserNotFound(String),
    InvalidPassword(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::UserNotFound(u) => write!(f, "User not found: {}", u),
            AuthError::InvalidPassword(u) => write!(f, "Invalid password for user: {}", u),
        }
    }
}

impl std::error::Error for AuthError {}

/// Storage module errors
#[derive(Debug)]
pub enum StorageError {
    NotFound(String),
    NotADirectory(String),
    IsADirectory(String),
    AlreadyExists(String),
    NotEmpty(String),
    InvalidPath(String),
    IoError(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(p) => write!(f, "Not found: {}", p),
            StorageError::NotADirectory(p) => write!(f, "Not a directory: {}", p),
            StorageError::IsADirectory(p) => write!(f, "Is a directory: {}", p),
            StorageError::AlreadyExists(p) => write!(f, "Already exists: {}", p),
            StorageError::NotEmpty(p) => write!(f, "Directory not empty: {}", p),
            StorageError::InvalidPath(p) => write!(f, "Invalid path: {}", p),
            StorageError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::IoError(error)
    }
}

/// Host-level server failures: everything that can go wrong before the
/// engine is ticking. Protocol errors never use this type, they are
/// written back to the peer as replies.
#[derive(Debug)]
pub enum FtpServerError {
    Bind(String, io::Error),
    Config(String),
    IoError(io::Error),
}

impl fmt::Display for FtpServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpServerError::Bind(addr, e) => write!(f, "Failed to bind to {}: {}", addr, e),
            FtpServerError::Config(e) => write!(f, "Configuration error: {}", e),
            FtpServerError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for FtpServerError {}

impl From<config::ConfigError> for FtpServerError {
    fn from(error: config::ConfigError) -> Self {
        FtpServerError::Config(error.to_string())
    }
}

impl From<io::Error> for FtpServerError {
    fn from(error: io::Error) -> Self {
        FtpServerError::IoError(error)
    }
}
