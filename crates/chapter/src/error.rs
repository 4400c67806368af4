//! Chapter Error Types

use derive_more::{Display, Error};

/// A chapter error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for chapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The fragment is not markup at all.
    #[display("malformed markup: {_0}")]
    MalformedMarkup(#[error(not(source))] String),
    /// A bundled template is missing or failed to compile or render.
    #[display("template error: {_0}")]
    Template(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
