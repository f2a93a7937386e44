//! Authentication validator
//!
//! Checks USER and PASS parameters against the configured credentials.

use super::credentials::ServerCredentials;
use crate::error::AuthError;

/// Validates the USER parameter.
pub fn validate_user(username: &str, credentials: &ServerCredentials) -> Result<(), AuthError> {
    if !credentials.requires_user() || credentials.username == username {
        Ok(())
    } else {
        Err(AuthError::UserNotFound(username.to_string()))
    }
}

/// Validates the PASS parameter.
pub fn validate_password(
    password: &str,
    credentials: &ServerCredentials,
) -> Result<(), AuthError> {
    if !credentials.requires_password() || credentials.password == password {
        Ok(())
    } else {
        Err(AuthError::InvalidPassword(credentials.username.clone()))
    }
}
