//! Error types for the submission pipeline.
//!
//! These cover the internal fallible plumbing (storage, serialization, HTTP).
//! The public submission operations never surface them directly; they are
//! folded into structured outcomes instead.

use thiserror::Error;

/// Result type alias using the formflow error type.
pub type Result<T> = std::result::Result<T, FormError>;

/// Main error type for the pipeline internals.
#[derive(Error, Debug)]
pub enum FormError {
    /// Draft storage I/O failed
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport-level failure that is not a reqwest error (mock transports, bad URLs)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FormError {
    /// Whether the error came from a request timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            FormError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: FormError = io.into();
        assert!(err.to_string().starts_with("Storage error"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_serde_error_converts() {
        let err: FormError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, FormError::Serialization(_)));
    }

    #[test]
    fn test_transport_message() {
        let err = FormError::Transport("connection reset".to_string());
        assert_eq!(err.to_string(), "Transport error: connection reset");
    }
}
