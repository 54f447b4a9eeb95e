//! Error types for the query engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for engine operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Opening or authenticating the connection failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server rejected or failed a statement
    #[error("Execution error: {message}")]
    Execution { message: String },

    /// The composed statement was empty; nothing was sent
    #[error("Empty statement")]
    EmptyStatement,

    /// The query template could not be filled from the given arguments
    #[error("Template error: {0}")]
    Template(String),

    /// Builder input that would produce malformed or unguarded SQL
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Transaction error: a transaction is already active")]
    TransactionActive,

    #[error("Transaction error: no active transaction")]
    NoTransaction,
}

impl Error {
    pub fn execution(message: impl Into<String>) -> Self {
        Error::Execution {
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::execution(e.to_string())
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for Error {
    fn from(e: mysql::Error) -> Self {
        Error::execution(e.to_string())
    }
}
