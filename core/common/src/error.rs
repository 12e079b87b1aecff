//! Common error types for AetherVault.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for AetherVault operations.
///
/// Every pipeline stage classifies its own failures into one of these
/// variants. `Integrity` deliberately carries no detail: a wrong password
/// and a corrupted carrier must look the same to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Input file or image does not exist.
    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Payload does not fit into the carrier image.
    #[error("Payload too large: {required} bytes needed, carrier holds at most {max} bytes")]
    CapacityExceeded {
        /// Bytes the caller attempted to embed.
        required: usize,
        /// Maximum bytes the carrier can hold.
        max: usize,
    },

    /// Envelope is malformed or uses an unsupported version.
    #[error("Invalid envelope format: {0}")]
    Format(String),

    /// Authentication failed: wrong password or corrupted data.
    #[error("Decryption failed. Incorrect password or corrupted data.")]
    Integrity,

    /// The image carries no embedded payload.
    #[error("No hidden data found in this image")]
    NotFound,

    /// Key derivation parameters were rejected.
    #[error("Key derivation error: {0}")]
    Derivation(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image could not be decoded or encoded.
    #[error("Carrier image error: {0}")]
    Carrier(String),

    /// Cover image provider failed.
    #[error("Cover image unavailable: {0}")]
    Cover(String),

    /// Output path is taken and the collision policy forbids replacing it.
    #[error("Output already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Item was cancelled before it started.
    #[error("Operation cancelled")]
    Cancelled,

    /// The worker running an item panicked or was aborted.
    #[error("Worker failed: {0}")]
    Worker(String),
}

/// Copyable classification of an [`Error`], used for per-item reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    SourceNotFound,
    CapacityExceeded,
    Format,
    Integrity,
    NotFound,
    Derivation,
    Io,
    Carrier,
    Cover,
    AlreadyExists,
    InvalidInput,
    Cancelled,
    Worker,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SourceNotFound(_) => ErrorKind::SourceNotFound,
            Error::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Error::Format(_) => ErrorKind::Format,
            Error::Integrity => ErrorKind::Integrity,
            Error::NotFound => ErrorKind::NotFound,
            Error::Derivation(_) => ErrorKind::Derivation,
            Error::Io(_) => ErrorKind::Io,
            Error::Carrier(_) => ErrorKind::Carrier,
            Error::Cover(_) => ErrorKind::Cover,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Worker(_) => ErrorKind::Worker,
        }
    }

    /// Map an I/O error on `path`, turning `NotFound` into `SourceNotFound`.
    pub fn from_source_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::SourceNotFound(path.into())
        } else {
            Error::Io(err)
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_message_is_generic() {
        let msg = Error::Integrity.to_string();
        assert!(msg.contains("Incorrect password or corrupted data"));
        assert!(!msg.to_lowercase().contains("tag"));
    }

    #[test]
    fn test_capacity_message_reports_sizes() {
        let err = Error::CapacityExceeded {
            required: 5000,
            max: 1200,
        };
        let msg = err.to_string();
        assert!(msg.contains("5000"));
        assert!(msg.contains("1200"));
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    }

    #[test]
    fn test_source_io_mapping() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from_source_io(missing, "/tmp/nope.txt");
        assert_eq!(err.kind(), ErrorKind::SourceNotFound);

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        let err = Error::from_source_io(denied, "/tmp/locked.txt");
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
