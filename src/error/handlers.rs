//! Error handlers
//!
//! Provides error logging and reply-code mapping.

use crate::error::types::{FtpServerError, StorageError};
use log::error;

/// Handle an FTP server error
pub fn handle_error(err: &FtpServerError) {
    error!("FTP Server Error: {}", err);
}

/// Convert a storage error to the FTP reply code used when opening a file
pub fn storage_error_to_ftp_code(err: &StorageError) -> u16 {
    match err {
        StorageError::NotFound(_) => 550,
        StorageError::InvalidPath(_) => 550,
        StorageError::NotADirectory(_) => 550,
        StorageError::NotEmpty(_) => 550,
        StorageError::AlreadyExists(_) => 553,
        StorageError::IsADirectory(_) => 450,
        StorageError::IoError(_) => 451,
    }
}
