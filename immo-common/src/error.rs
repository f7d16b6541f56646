//! Common error types for immotep

use thiserror::Error;

/// Common result type for immotep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the immotep crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited file could not be read or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// External HTTP service failure (transport error or non-2xx status)
    #[error("HTTP error{}: {message}", status.map(|s| format!(" {}", s)).unwrap_or_default())]
    Http {
        status: Option<u16>,
        message: String,
    },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Transport-level HTTP failure (no status received)
    pub fn http_transport(message: impl Into<String>) -> Self {
        Error::Http {
            status: None,
            message: message.into(),
        }
    }

    /// Non-success HTTP status returned by the remote service
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Error::Http {
            status: Some(status),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = Error::http_status(503, "unavailable");
        assert_eq!(err.to_string(), "HTTP error 503: unavailable");

        let err = Error::http_transport("connection refused");
        assert_eq!(err.to_string(), "HTTP error: connection refused");
    }
}
