//! Common error types used throughout bitforge.
//!
//! This module provides a unified error type that covers the failure cases
//! shared by the scanner, the checkpoint manager, and result persistence.

/// Common error type for bitforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The manifest could not be read or parsed.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Persisted checkpoint files contradict each other or the manifest.
    #[error("Inconsistent checkpoint: {0}")]
    Inconsistent(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new Manifest error.
    pub fn manifest<S: Into<String>>(msg: S) -> Self {
        Self::Manifest(msg.into())
    }

    /// Create a new Inconsistent error.
    pub fn inconsistent<S: Into<String>>(msg: S) -> Self {
        Self::Inconsistent(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::manifest("unexpected EOF");
        assert_eq!(err.to_string(), "Manifest error: unexpected EOF");

        let err = Error::inconsistent("overlap");
        assert_eq!(err.to_string(), "Inconsistent checkpoint: overlap");

        let err = Error::invalid_input("bad format");
        assert_eq!(err.to_string(), "Invalid input: bad format");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(Error::manifest("x"), Error::Manifest(_)));
        assert!(matches!(Error::inconsistent("x"), Error::Inconsistent(_)));
        assert!(matches!(Error::internal("x"), Error::Internal(_)));
    }
}
