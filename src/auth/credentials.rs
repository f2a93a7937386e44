//! Credentials configured for the control session

/// Username and password the server accepts.
///
/// An empty field accepts anything, so `ServerCredentials::default()`
/// runs an open server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerCredentials {
    pub username: String,
    pub password: String,
}

impl ServerCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn requires_user(&self) -> bool {
        !self.username.is_empty()
    }

    pub fn requires_password(&self) -> bool {
        !self.password.is_empty()
    }
}
