//! Server credentials a client session connects with

/// Where and as whom the client logs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Kept for API compatibility; plain FTP has no certificate to check.
    pub validate_ca: bool,
}

impl Credentials {
    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            host: host.into(),
            port: 21,
            validate_ca: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}
