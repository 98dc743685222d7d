//! Error types for mysql-helpers

use thiserror::Error;

/// Result type alias for mysql-helpers operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring sessions or running statements
#[derive(Error, Debug)]
pub enum Error {
    /// A required connection parameter is missing or malformed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The driver could not establish or validate a connection
    #[error("Connection error: failed to connect to {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: Box<Error>,
    },

    /// A statement failed after the connection was established
    #[error("Statement error: {0}")]
    Statement(String),

    /// The server reported warnings and the session raises on warnings
    #[error("Statement produced {count} warning(s)")]
    Warnings { count: u16 },

    /// MySQL driver error
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    /// Type conversion error
    #[error("Type conversion error: expected {expected}, got {actual}")]
    TypeConversion {
        expected: &'static str,
        actual: String,
    },

    /// Column not found in a row or table
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Null value for non-optional target
    #[error("Unexpected null value for column: {0}")]
    UnexpectedNull(String),

    /// The blocking runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means no usable connection was obtained.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Whether this error came from running a statement on a live connection.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Error::Statement(_)
                | Error::Warnings { .. }
                | Error::MySql(_)
                | Error::TypeConversion { .. }
                | Error::ColumnNotFound(_)
                | Error::UnexpectedNull(_)
        )
    }

    pub(crate) fn connection(host: &str, port: u16, source: Error) -> Self {
        Error::Connection {
            host: host.to_string(),
            port,
            source: Box::new(source),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_keeps_cause() {
        let err = Error::connection("bad-host", 3306, Error::Statement("refused".into()));
        assert!(err.is_connection());
        assert!(!err.is_statement());
        assert!(err.to_string().contains("bad-host:3306"));

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "Statement error: refused");
    }

    #[test]
    fn test_statement_classification() {
        assert!(Error::Warnings { count: 2 }.is_statement());
        assert!(Error::Statement("syntax".into()).is_statement());
        assert!(!Error::Configuration("host".into()).is_statement());
    }
}
