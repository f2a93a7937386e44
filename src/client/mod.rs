//! FTP client engine
//!
//! Uploads or downloads a single file per session against a remote FTP
//! server, either blocking or driven tick by tick.

pub mod handler;
pub mod operations;
pub mod results;
pub mod session;
pub mod state;

pub use handler::FtpClient;
pub use results::{Status, TransferResult};
pub use session::Credentials;
pub use state::{ClientState, Direction};
