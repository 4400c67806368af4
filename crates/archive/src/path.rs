//! Archive-internal path validation.
//!
//! ZIP entry names always use `/` separators regardless of platform, so paths
//! are handled as strings rather than [`std::path::Path`].

use crate::error::{ErrorKind, Result};

/// Validates and normalizes an archive-internal entry path.
///
/// Leading separators and `.` segments are dropped, `..` segments are resolved
/// but may never climb above the archive root.
///
/// # Examples
///
/// ```
/// use bindery_archive::validate_path;
/// assert_eq!(validate_path("EPUB/text/chapter-1.xhtml").unwrap(), "EPUB/text/chapter-1.xhtml");
/// assert_eq!(validate_path("/EPUB//./css/../css/core.css").unwrap(), "EPUB/css/core.css");
/// assert!(validate_path("../mimetype").is_err());
/// assert!(validate_path("").is_err());
/// ```
pub fn validate(path: impl AsRef<str>) -> Result<String> {
    let raw = path.as_ref();
    if raw.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
                }
            },
            s => segments.push(s),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(raw.to_string())),
        false => Ok(segments.join("/")),
    }
}
