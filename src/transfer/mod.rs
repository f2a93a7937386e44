//! Transfer module
//!
//! Shared transport and buffer core of the client and server engines:
//! non-blocking connections, the PASV/PORT address codec, the scratch
//! buffer and the file/socket pumps.

pub mod address;
pub mod buffer;
pub mod connection;
pub mod data_channel;
pub mod file_ops;
pub mod modes;
pub mod results;

pub use address::{format_address_tuple, parse_address_tuple};
pub use buffer::TransferBuffer;
pub use connection::Connection;
pub use data_channel::DataChannel;
pub use modes::DataMode;
pub use results::{DataConnectState, TransferFailure};
