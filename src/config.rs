//! Connection parameters for network sessions.

use serde::Deserialize;
use std::fmt;

/// Default MySQL port
pub const DEFAULT_PORT: u16 = 3306;

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Where and as whom to connect. Loading these values is the caller's job;
/// the struct deserializes from any serde format.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
}

impl ConnectionConfig {
    /// Create a config for the default port
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: password.into(),
            database: database.into(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

// Keeps the password out of logs.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}
