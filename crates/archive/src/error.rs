//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The entry does not exist in the archive (or is staged for deletion).
    #[display("archive entry not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Archive-internal path is empty, absolute-escaping, or contains NUL bytes.
    #[display("invalid archive path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// The file is not a readable ZIP container. Don't retry with the same input.
    #[display("invalid or corrupted archive")]
    InvalidArchive,
    /// An I/O operation failed while reading or rewriting the archive.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}
