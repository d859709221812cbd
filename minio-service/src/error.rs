use bytesize::ByteSize;
use thiserror::Error;

use crate::path::InvalidPathError;

/// Errors that can occur in the storage service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The object path was rejected.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] InvalidPathError),

    /// The object does not fit into the backend at all.
    #[error("object of at least {size} exceeds the storage capacity of {capacity}")]
    TooLarge {
        /// Bytes received when the object was rejected.
        size: ByteSize,
        /// Total capacity of the backend.
        capacity: ByteSize,
    },

    /// An I/O error, either from streaming the payload or from file operations.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for service operations.
pub type Result<T, E = ServiceError> = std::result::Result<T, E>;
