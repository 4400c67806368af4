use std::fs::File;
use std::io::{ErrorKind as IoErrorKind, Read};
use std::path::{Path, PathBuf};

use exn::{OptionExt, ResultExt};
use tracing::instrument;
use zip::ZipArchive;

use crate::error::{ErrorKind, Result};
use crate::overlay::{Overlay, Pending};
use crate::path::validate as validate_path;
use crate::{Commit, Compression};

/// An open archive with an overlay of staged operations.
///
/// All reads see the overlay: staged writes win over the original payload and
/// staged deletes read as missing. Nothing reaches the disk until
/// [`close`](Self::close).
pub struct PatchSession {
    pub(crate) path: PathBuf,
    // Only `None` once a commit has released the read handle.
    pub(crate) source: Option<ZipArchive<File>>,
    entries: Vec<String>,
    pub(crate) compression: Compression,
    pub(crate) overlay: Overlay,
}

impl PatchSession {
    #[instrument(skip_all, fields(path = %path.display(), entries))]
    pub(crate) fn open(path: &Path, compression: Compression) -> Result<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                exn::bail!(ErrorKind::NotFound(path.display().to_string()))
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io),
        };
        let mut source = ZipArchive::new(file).or_raise(|| ErrorKind::InvalidArchive)?;
        let mut entries = Vec::with_capacity(source.len());
        for index in 0..source.len() {
            let entry = source.by_index_raw(index).or_raise(|| ErrorKind::InvalidArchive)?;
            entries.push(entry.name().to_string());
        }
        tracing::Span::current().record("entries", entries.len());
        Ok(Self {
            path: path.to_path_buf(),
            source: Some(source),
            entries,
            compression,
            overlay: Overlay::default(),
        })
    }

    /// Location of the archive on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Effective entry list: original entries that are not staged for
    /// deletion (in archive order), followed by newly staged paths.
    pub fn names(&self) -> Vec<String> {
        let originals =
            self.entries.iter().filter(|name| !matches!(self.overlay.get(name.as_str()), Some(Pending::Delete)));
        let added = self.overlay.staged_writes().filter(|name| !self.is_original(name)).map(str::to_string);
        originals.cloned().chain(added).collect()
    }

    /// Returns `true` if the path exists in the effective entry list.
    pub fn contains(&self, path: impl AsRef<str>) -> bool {
        let Ok(path) = validate_path(path) else {
            return false;
        };
        match self.overlay.get(&path) {
            Some(Pending::Write(_)) => true,
            Some(Pending::Delete) => false,
            None => self.is_original(&path),
        }
    }

    fn is_original(&self, path: &str) -> bool {
        self.entries.iter().any(|entry| entry == path)
    }

    /// Reads an entry, preferring staged bytes over the original payload.
    #[instrument(level = "trace", skip_all, fields(entry = path.as_ref()))]
    pub fn read(&mut self, path: impl AsRef<str>) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        match self.overlay.get(&path) {
            Some(Pending::Write(data)) => return Ok(data.clone()),
            Some(Pending::Delete) => exn::bail!(ErrorKind::NotFound(path)),
            None => {},
        }
        if !self.is_original(&path) {
            exn::bail!(ErrorKind::NotFound(path));
        }
        let source = self.source.as_mut().ok_or_raise(|| ErrorKind::InvalidArchive)?;
        let mut entry = source.by_name(&path).or_raise(|| ErrorKind::InvalidArchive)?;
        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
        entry.read_to_end(&mut data).or_raise(|| ErrorKind::InvalidArchive)?;
        Ok(data)
    }

    /// Stages a write that supersedes any existing entry (or earlier staged
    /// write) at `path`.
    #[instrument(level = "debug", skip_all, fields(entry = path.as_ref(), size))]
    pub fn queue_write(&mut self, path: impl AsRef<str>, data: impl Into<Vec<u8>>) -> Result<()> {
        let path = validate_path(path)?;
        let data = data.into();
        tracing::Span::current().record("size", data.len());
        if self.overlay.write(path, data).is_some() {
            tracing::trace!("earlier staged operation superseded");
        }
        Ok(())
    }

    /// Stages the removal of `path`.
    ///
    /// Returns whether the path currently exists. Deleting a missing path is
    /// not an error: the staged delete is simply ignored on commit.
    #[instrument(level = "debug", skip_all, fields(entry = path.as_ref()))]
    pub fn queue_delete(&mut self, path: impl AsRef<str>) -> Result<bool> {
        let path = validate_path(path)?;
        let existed = self.contains(&path);
        self.overlay.delete(path);
        Ok(existed)
    }

    /// Number of staged operations.
    pub fn staged(&self) -> usize {
        self.overlay.len()
    }

    /// Total bytes held by staged writes.
    pub fn staged_bytes(&self) -> usize {
        self.overlay.staged_bytes()
    }

    /// Ends the session, rebuilding the archive if anything was staged.
    ///
    /// Every staged buffer is released before this returns, on success and
    /// on failure. A failed commit leaves the original archive untouched.
    #[instrument(skip_all, fields(path = %self.path.display(), staged = self.overlay.len()))]
    pub fn close(mut self) -> Result<Commit> {
        self.finish()
    }

    /// Ends the session without writing anything, returning how many staged
    /// operations were discarded.
    pub fn discard(mut self) -> usize {
        self.overlay.clear()
    }

    fn finish(&mut self) -> Result<Commit> {
        let result = match self.overlay.is_empty() {
            true => Ok(Commit::Skipped),
            false => self.commit(),
        };
        let released = self.overlay.clear();
        if released > 0 {
            tracing::debug!(released, "staged operations released after failed commit");
        }
        result
    }
}

impl Drop for PatchSession {
    fn drop(&mut self) {
        if !self.overlay.is_empty() {
            let discarded = self.overlay.clear();
            tracing::warn!(
                path = %self.path.display(),
                discarded,
                "archive session dropped without closing; staged operations discarded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OpenOptions, Stats};
    use std::io::Write;
    use zip::CompressionMethod;
    use zip::write::SimpleFileOptions;

    const ENTRIES: [(&str, &[u8]); 4] = [
        ("mimetype", b"application/epub+zip"),
        ("META-INF/container.xml", b"<container/>"),
        ("EPUB/text/ch001.xhtml", b"<html>one</html>"),
        ("EPUB/nav.xhtml", b"<html>nav</html>"),
    ];

    fn fixture(dir: &Path) -> PathBuf {
        let path = dir.join("work.epub");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        for (name, data) in ENTRIES {
            let method = match name {
                "mimetype" => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            writer.start_file(name, SimpleFileOptions::default().compression_method(method)).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn read_back(path: &Path) -> Vec<(String, Vec<u8>, CompressionMethod)> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut entry = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (entry.name().to_string(), data, entry.compression())
            })
            .collect()
    }

    #[test]
    fn test_open_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let err = crate::open(dir.path().join("missing.epub")).err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_open_rejects_non_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not.epub");
        std::fs::write(&path, b"definitely not a zip file").unwrap();
        let err = crate::open(&path).err().unwrap();
        assert_eq!(*err, ErrorKind::InvalidArchive);
    }

    #[test]
    fn test_read_prefers_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = crate::open(fixture(dir.path())).unwrap();
        assert_eq!(session.read("EPUB/nav.xhtml").unwrap(), b"<html>nav</html>");
        session.queue_write("EPUB/nav.xhtml", "<html>new</html>").unwrap();
        assert_eq!(session.read("EPUB/nav.xhtml").unwrap(), b"<html>new</html>");
        session.queue_delete("EPUB/nav.xhtml").unwrap();
        let err = session.read("EPUB/nav.xhtml").unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert!(session.read("EPUB/missing.xhtml").is_err());
    }

    #[test]
    fn test_names_reflect_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = crate::open(fixture(dir.path())).unwrap();
        session.queue_write("EPUB/css/core.css", "body {}").unwrap();
        session.queue_delete("EPUB/nav.xhtml").unwrap();
        session.queue_write("mimetype", "application/epub+zip").unwrap();
        assert_eq!(
            session.names(),
            vec!["mimetype", "META-INF/container.xml", "EPUB/text/ch001.xhtml", "EPUB/css/core.css"]
        );
        assert!(session.contains("EPUB/css/core.css"));
        assert!(!session.contains("EPUB/nav.xhtml"));
    }

    #[test]
    fn test_queue_delete_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = crate::open(fixture(dir.path())).unwrap();
        assert!(session.queue_delete("EPUB/nav.xhtml").unwrap());
        assert!(!session.queue_delete("EPUB/styles/stylesheet1.css").unwrap());
        assert!(session.queue_delete("../escape").is_err());
    }

    #[test]
    fn test_close_without_operations_is_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let before = std::fs::read(&path).unwrap();
        let session = crate::open(&path).unwrap();
        assert_eq!(session.close().unwrap(), Commit::Skipped);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_commit_applies_writes_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let mut session = crate::open(&path).unwrap();
        session.queue_write("EPUB/text/ch001.xhtml", "<html>replaced</html>").unwrap();
        session.queue_write("EPUB/text/ch001.xhtml", "<html>replaced twice</html>").unwrap();
        session.queue_delete("EPUB/nav.xhtml").unwrap();
        let commit = session.close().unwrap();
        assert_eq!(
            commit,
            Commit::Rebuilt(Stats { copied: 2, replaced: 1, deleted: 1, appended: 0, ignored: 0 })
        );
        let entries = read_back(&path);
        let names: Vec<_> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["mimetype", "META-INF/container.xml", "EPUB/text/ch001.xhtml"]);
        assert_eq!(entries[0].1, b"application/epub+zip");
        assert_eq!(entries[1].1, b"<container/>");
        assert_eq!(entries[2].1, b"<html>replaced twice</html>");
    }

    #[test]
    fn test_new_paths_are_appended_in_staging_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let mut session = crate::open(&path).unwrap();
        session.queue_write("EPUB/toc.xhtml", "<toc/>").unwrap();
        session.queue_write("EPUB/content.opf", "<package/>").unwrap();
        session.queue_delete("EPUB/never-existed.css").unwrap();
        let commit = session.close().unwrap();
        assert_eq!(
            commit,
            Commit::Rebuilt(Stats { copied: 4, replaced: 0, deleted: 0, appended: 2, ignored: 1 })
        );
        let entries = read_back(&path);
        let names: Vec<_> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names[4..], ["EPUB/toc.xhtml", "EPUB/content.opf"]);
        assert_eq!(entries[5].1, b"<package/>");
    }

    #[test]
    fn test_replaced_entries_keep_compression() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let mut session = OpenOptions::new().compression(Compression::Stored).open(&path).unwrap();
        session.queue_write("mimetype", "application/epub+zip").unwrap();
        session.queue_write("EPUB/nav.xhtml", "<html>nav2</html>").unwrap();
        session.queue_write("EPUB/added.txt", "added").unwrap();
        session.close().unwrap();
        let entries = read_back(&path);
        assert_eq!(entries[0].2, CompressionMethod::Stored);
        assert_eq!(entries[3].2, CompressionMethod::Deflated);
        assert_eq!(entries[4].2, CompressionMethod::Stored);
    }

    #[test]
    fn test_aborted_rebuild_leaves_original_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let before = std::fs::read(&path).unwrap();
        let mut session = crate::open(&path).unwrap();
        session.queue_write("EPUB/nav.xhtml", "<html>lost</html>").unwrap();
        session.queue_delete("mimetype").unwrap();
        let (staging, _stats) = session.rebuild().unwrap();
        // Crash before the rename: the staged archive is thrown away.
        drop(staging);
        drop(session);
        assert_eq!(std::fs::read(&path).unwrap(), before);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_failed_commit_releases_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        let path = fixture(&nested);
        let mut session = crate::open(&path).unwrap();
        session.queue_write("EPUB/nav.xhtml", vec![0u8; 1024]).unwrap();
        session.queue_write("EPUB/new.xhtml", vec![0u8; 1024]).unwrap();
        // Pull the directory out from under the session so staging fails.
        std::fs::remove_dir_all(&nested).unwrap();
        let err = session.finish().unwrap_err();
        assert_eq!(*err, ErrorKind::Io);
        assert_eq!(session.staged(), 0);
        assert_eq!(session.staged_bytes(), 0);
    }

    #[test]
    fn test_drop_discards_staged_operations() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let before = std::fs::read(&path).unwrap();
        {
            let mut session = crate::open(&path).unwrap();
            session.queue_write("EPUB/nav.xhtml", "<html>discarded</html>").unwrap();
        }
        assert_eq!(std::fs::read(&path).unwrap(), before);
        let mut session = crate::open(&path).unwrap();
        session.queue_delete("EPUB/nav.xhtml").unwrap();
        assert_eq!(session.discard(), 1);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
