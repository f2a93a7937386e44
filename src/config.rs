//! Configuration management for the tickftp server host
//!
//! Built-in defaults, then an optional `config.toml`, then `TICKFTP_*`
//! environment variables.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// IP address both listeners bind to
    pub bind_address: String,

    /// Port for the FTP control connection, 0 for an ephemeral port
    pub control_port: u16,

    /// Port advertised by PASV, 0 for an ephemeral port
    pub passive_port: u16,

    /// Root directory served by the disk storage
    pub server_root: String,

    /// Empty accepts any username
    pub username: String,

    /// Empty accepts any password
    pub password: String,

    pub idle_timeout_secs: u64,
    pub login_timeout_secs: u64,
    pub data_connect_timeout_secs: u64,

    /// Maximum FTP command line length
    pub max_command_length: usize,

    /// Preferred transfer buffer size
    pub buffer_size: usize,

    /// Largest block the host can allocate, 0 when unknown. Buffers are
    /// capped to half of it.
    pub max_block_size: usize,

    /// Host loop period
    pub tick_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            control_port: 21,
            passive_port: 50009,
            server_root: "./server_root".to_string(),
            username: String::new(),
            password: String::new(),
            idle_timeout_secs: 300,
            login_timeout_secs: 10,
            data_connect_timeout_secs: 5,
            max_command_length: 127,
            buffer_size: 1460,
            max_block_size: 0,
            tick_interval_ms: 5,
        }
    }
}

impl ServerConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let settings = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("control_port", defaults.control_port)?
            .set_default("passive_port", defaults.passive_port)?
            .set_default("server_root", defaults.server_root)?
            .set_default("username", defaults.username)?
            .set_default("password", defaults.password)?
            .set_default("idle_timeout_secs", defaults.idle_timeout_secs)?
            .set_default("login_timeout_secs", defaults.login_timeout_secs)?
            .set_default(
                "data_connect_timeout_secs",
                defaults.data_connect_timeout_secs,
            )?
            .set_default("max_command_length", defaults.max_command_length as u64)?
            .set_default("buffer_size", defaults.buffer_size as u64)?
            .set_default("max_block_size", defaults.max_block_size as u64)?
            .set_default("tick_interval_ms", defaults.tick_interval_ms)?
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("TICKFTP").try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.server_root.is_empty() {
            return Err(config::ConfigError::Message(
                "server_root cannot be empty".into(),
            ));
        }

        if self.passive_port != 0 && self.passive_port == self.control_port {
            return Err(config::ConfigError::Message(
                "passive_port must differ from control_port".into(),
            ));
        }

        if self.max_command_length < 8 {
            return Err(config::ConfigError::Message(
                "max_command_length must be at least 8".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if self.tick_interval_ms == 0 {
            return Err(config::ConfigError::Message(
                "tick_interval_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and control port as socket address
    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    /// Get bind address and passive port as socket address
    pub fn passive_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.passive_port)
    }

    /// Get server root as PathBuf
    pub fn server_root_path(&self) -> PathBuf {
        PathBuf::from(&self.server_root)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn data_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.data_connect_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn max_block(&self) -> Option<usize> {
        (self.max_block_size > 0).then_some(self.max_block_size)
    }
}
