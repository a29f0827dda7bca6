//! Error types for the blocktable storage engine.

use std::io;
use thiserror::Error;

/// The result type used throughout blocktable.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for blocktable operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Data corruption was detected (bad magic, truncated buffer,
    /// malformed varint, wrong trailer size).
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The component is in an invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A compression or decompression failure.
    #[error("Compression error: {0}")]
    Compression(String),

    /// A size limit was exceeded (e.g. the decompression output ceiling).
    #[error("Capacity exceeded: {limit} bytes")]
    CapacityExceeded {
        /// The configured limit that was exceeded.
        limit: usize,
    },
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Creates a new compression error.
    pub fn compression(msg: impl Into<String>) -> Self {
        Error::Compression(msg.into())
    }
}
