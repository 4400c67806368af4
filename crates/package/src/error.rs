//! Package Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Errors from the archive, chapter and
//! model crates are raised as children of these kinds.

use derive_more::{Display, Error};

/// A packaging error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for packaging operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An operation was called before its prerequisite (usually metadata) was set.
    #[display("{_0} must be set first")]
    Precondition(#[error(not(source))] &'static str),
    /// A source file or required archive entry does not exist.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Input bytes are not valid markup, base64, or a supported image type.
    #[display("unsupported or malformed input: {_0}")]
    Format(#[error(not(source))] String),
    /// The generated manifest documents disagree with each other. This is a bug.
    #[display("package documents are inconsistent: {_0}")]
    Integrity(#[error(not(source))] String),
    /// Metadata was rejected (missing required field, unparseable value).
    #[display("invalid metadata")]
    Metadata,
    /// Build options could not be extracted from the environment.
    #[display("invalid build options")]
    Config,
    /// The working archive could not be opened, read or rewritten.
    #[display("archive error")]
    Archive,
    /// A bundled page template failed to compile or render.
    #[display("template error")]
    Template,
    /// No document converter is available on this system.
    #[display("document converter not found")]
    ConverterNotFound,
    /// The document converter exited unsuccessfully.
    #[display("document converter exited with code: {_0}")]
    ConversionFailed(#[error(not(source))] i32),
    /// Reading a source file or writing generated XML failed.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}
