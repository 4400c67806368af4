//! Transactional patching of an existing ZIP container.
//!
//! A [`PatchSession`] stages writes and deletes in memory without touching the
//! archive on disk. Closing the session rebuilds the archive exactly once:
//!
//! - every original entry is streamed, in its original order, into a new
//!   archive in the same directory; staged writes replace the payload of
//!   existing entries and staged deletes drop them,
//! - staged writes for paths that did not previously exist are appended after
//!   the original entries, in the order they were first staged,
//! - the finished archive is renamed over the original, so a failure at any
//!   point before the rename leaves the original byte-for-byte untouched.
//!
//! Staged buffers are released when the session is closed, whether the
//! rebuild succeeded or not, and when the session is dropped without being
//! closed (in which case nothing is written).
//!
//! ```no_run
//! # fn main() -> bindery_archive::error::Result<()> {
//! let mut session = bindery_archive::open("work.epub")?;
//! session.queue_write("EPUB/toc.xhtml", "<html/>")?;
//! session.queue_delete("EPUB/nav.xhtml")?;
//! session.close()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
mod overlay;
mod path;
mod rebuild;
mod session;

use std::path::Path;

use zip::write::SimpleFileOptions;

use crate::error::Result;
pub use crate::path::validate as validate_path;
pub use crate::rebuild::{Commit, Stats};
pub use crate::session::PatchSession;

/// Compression applied to entries that are newly added to an archive.
///
/// Replaced entries always keep the compression method they had in the
/// original archive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "lowercase"))]
pub enum Compression {
    /// Uncompressed
    Stored,
    /// Deflate
    #[default]
    Deflated,
}
impl Compression {
    pub(crate) fn options(self) -> SimpleFileOptions {
        let method = match self {
            Compression::Stored => zip::CompressionMethod::Stored,
            Compression::Deflated => zip::CompressionMethod::Deflated,
        };
        SimpleFileOptions::default().compression_method(method)
    }
}

/// Options used when opening a [`PatchSession`].
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenOptions {
    compression: Compression,
}
impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Opens an existing archive for patching.
    ///
    /// # Errors
    ///
    /// - [`NotFound`](error::ErrorKind::NotFound) if the file does not exist,
    /// - [`InvalidArchive`](error::ErrorKind::InvalidArchive) if it is not a ZIP container.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<PatchSession> {
        PatchSession::open(path.as_ref(), self.compression)
    }
}

/// Opens an existing archive for patching with default options.
pub fn open(path: impl AsRef<Path>) -> Result<PatchSession> {
    OpenOptions::new().open(path)
}

/// Scoped form of [`open`]: the session is committed when `f` returns `Ok`
/// and discarded when it returns `Err`.
pub fn patch<T>(path: impl AsRef<Path>, f: impl FnOnce(&mut PatchSession) -> Result<T>) -> Result<(T, Commit)> {
    let mut session = open(path)?;
    match f(&mut session) {
        Ok(value) => Ok((value, session.close()?)),
        Err(e) => {
            let discarded = session.discard();
            tracing::debug!(discarded, "patch aborted");
            Err(e)
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn compression_default() {
        assert_eq!(Compression::default(), Compression::Deflated);
    }

    fn single_entry(dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join("single.zip");
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        writer.start_file("a.txt", zip::write::SimpleFileOptions::default()).unwrap();
        writer.write_all(b"a").unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn patch_commits_on_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = single_entry(dir.path());
        let (existed, commit) = crate::patch(&path, |session| session.queue_delete("a.txt")).unwrap();
        assert!(existed);
        assert!(matches!(commit, crate::Commit::Rebuilt(stats) if stats.deleted == 1));
        assert!(crate::open(&path).unwrap().names().is_empty());
    }

    #[test]
    fn patch_discards_on_err() {
        let dir = tempfile::tempdir().unwrap();
        let path = single_entry(dir.path());
        let before = std::fs::read(&path).unwrap();
        let result = crate::patch(&path, |session| {
            session.queue_write("b.txt", "b")?;
            session.read("missing.txt")
        });
        assert!(matches!(&*result.unwrap_err(), ErrorKind::NotFound(_)));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
