//! Authentication system
//!
//! Holds the configured credentials and validates USER/PASS against them.

pub mod credentials;
pub mod validator;

pub use credentials::ServerCredentials;
pub use validator::{validate_password, validate_user};
