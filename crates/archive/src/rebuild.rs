//! Rebuilding an archive from its original entries plus the staged overlay.

use std::io::Write;
use std::path::Path;

use exn::{OptionExt, ResultExt};
use tempfile::NamedTempFile;
use tracing::instrument;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::PatchSession;
use crate::error::{ErrorKind, Result};
use crate::overlay::Pending;

/// Counts of what happened to each entry during a rebuild.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Original entries copied through unchanged.
    pub copied: usize,
    /// Original entries whose payload was replaced by a staged write.
    pub replaced: usize,
    /// Original entries dropped by a staged delete.
    pub deleted: usize,
    /// Staged writes for paths that did not exist in the original archive.
    pub appended: usize,
    /// Staged deletes for paths that did not exist in the original archive.
    pub ignored: usize,
}

/// Outcome of closing a [`PatchSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// Nothing was staged; the archive was not touched.
    Skipped,
    /// The archive was rebuilt and atomically replaced.
    Rebuilt(Stats),
}

impl PatchSession {
    /// Rebuilds the archive and swaps it into place.
    pub(crate) fn commit(&mut self) -> Result<Commit> {
        let (staging, stats) = self.rebuild()?;
        // Release the read handle before the rename replaces the file under it.
        self.source = None;
        staging.persist(&self.path).or_raise(|| ErrorKind::Io)?;
        tracing::debug!(?stats, "archive rebuilt");
        Ok(Commit::Rebuilt(stats))
    }

    /// Writes the patched archive to a temporary file next to the original.
    ///
    /// Consumes the staged operations as they are applied. The original
    /// archive is only read; dropping the returned file discards the rebuild.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub(crate) fn rebuild(&mut self) -> Result<(NamedTempFile, Stats)> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staging = NamedTempFile::new_in(directory).or_raise(|| ErrorKind::Io)?;
        let mut writer = ZipWriter::new(staging);
        let mut stats = Stats::default();
        let source = self.source.as_mut().ok_or_raise(|| ErrorKind::InvalidArchive)?;
        for index in 0..source.len() {
            let entry = source.by_index_raw(index).or_raise(|| ErrorKind::InvalidArchive)?;
            let name = entry.name().to_string();
            match self.overlay.take(&name) {
                Some(Pending::Delete) => stats.deleted += 1,
                Some(Pending::Write(data)) => {
                    let options = SimpleFileOptions::default().compression_method(entry.compression());
                    drop(entry);
                    writer.start_file(name, options).or_raise(|| ErrorKind::Io)?;
                    writer.write_all(&data).or_raise(|| ErrorKind::Io)?;
                    stats.replaced += 1;
                },
                None => {
                    writer.raw_copy_file(entry).or_raise(|| ErrorKind::Io)?;
                    stats.copied += 1;
                },
            }
        }
        for (name, operation) in self.overlay.drain_remaining() {
            match operation {
                Pending::Write(data) => {
                    writer.start_file(name, self.compression.options()).or_raise(|| ErrorKind::Io)?;
                    writer.write_all(&data).or_raise(|| ErrorKind::Io)?;
                    stats.appended += 1;
                },
                Pending::Delete => {
                    tracing::debug!(entry = %name, "staged delete for missing entry ignored");
                    stats.ignored += 1;
                },
            }
        }
        let staging = writer.finish().or_raise(|| ErrorKind::Io)?;
        staging.as_file().sync_all().or_raise(|| ErrorKind::Io)?;
        Ok((staging, stats))
    }
}
