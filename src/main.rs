//! tickftp server - Entry Point
//!
//! Serves a directory over FTP, ticking the server engine from a tokio
//! interval until Ctrl-C.

use log::{info, warn};
use std::process;
use tokio::time::MissedTickBehavior;

use tickftp::Server;
use tickftp::config::ServerConfig;
use tickftp::error::FtpServerError;
use tickftp::error::handlers::handle_error;
use tickftp::storage::DiskStorage;

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    info!("Launching FTP server...");

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            handle_error(&FtpServerError::from(e));
            process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(config.server_root_path()) {
        warn!("Failed to create server root directory: {}", e);
    } else {
        info!("Server root directory: {}", config.server_root);
    }

    let storage = DiskStorage::new(config.server_root_path());
    let mut server = Server::new(config.clone(), storage);
    if let Err(e) = server.begin(&config.username, &config.password) {
        handle_error(&e);
        process::exit(1);
    }

    let mut ticker = tokio::time::interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => server.tick(),
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutting down FTP server");
                break;
            }
        }
    }

    server.stop();
}
