//! tickftp - non-blocking FTP client and server engines
//!
//! Both engines are driven by repeated `tick()` calls from a host loop and
//! never block on the network.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod navigate;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod transfer;
pub mod utils;

pub use client::{Credentials, Direction, FtpClient, Status, TransferResult};
pub use config::ServerConfig;
pub use server::Server;
