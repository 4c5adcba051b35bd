//! Error types for httpsink

use std::io;

use hyper::StatusCode;
use thiserror::Error;

/// Result type for httpsink operations
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors that can occur in httpsink
#[derive(Debug, Error)]
pub enum SinkError {
    /// Store is full and rejects further captures
    #[error("http sink is at capacity")]
    CapacityExceeded {
        /// Configured capacity
        capacity: usize,
    },

    /// Requested index does not name a live capture
    #[error("index is out of range")]
    IndexOutOfRange(i64),

    /// Caller-supplied index could not be parsed
    #[error("index is not an integer")]
    NotAnInteger(String),

    /// No captures stored
    #[error("no requests have been received")]
    Empty,

    /// Required path parameter absent
    #[error("missing {0}")]
    MissingParameter(&'static str),

    /// x-smtpapi header did not parse as JSON
    #[error("invalid x-smtpapi header: {0}")]
    MalformedRecipientHeader(#[from] serde_json::Error),

    /// Mirror send failed
    #[error("mirror delivery failed: {0}")]
    MirrorDelivery(String),

    /// Request body exceeds the configured limit
    #[error("request body too large: {size} bytes exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Actual size
        size: usize,
        /// Size limit
        limit: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl SinkError {
    /// HTTP status reported to the caller for this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::CapacityExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
            Self::IndexOutOfRange(_) | Self::NotAnInteger(_) | Self::MissingParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Empty => StatusCode::NOT_FOUND,
            Self::DataTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            SinkError::CapacityExceeded { capacity: 1 }.status(),
            StatusCode::INSUFFICIENT_STORAGE
        );
        assert_eq!(
            SinkError::NotAnInteger("abc".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(SinkError::IndexOutOfRange(0).status(), StatusCode::BAD_REQUEST);
        assert_eq!(SinkError::Empty.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            SinkError::MissingParameter("recipient").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SinkError::Other("boom".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            SinkError::CapacityExceeded { capacity: 3 }.to_string(),
            "http sink is at capacity"
        );
        assert_eq!(
            SinkError::MissingParameter("recipient").to_string(),
            "missing recipient"
        );
        assert_eq!(
            SinkError::Empty.to_string(),
            "no requests have been received"
        );
    }
}
