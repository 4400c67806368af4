//! Chapter discovery and contiguous renumbering.

use std::collections::HashSet;
use std::sync::LazyLock;

use bindery_archive::PatchSession;
use bindery_chapter::Normalizer;
use bindery_model::{Matter, Spine};
use exn::ResultExt;
use regex::Regex;
use tracing::instrument;

use crate::BuildOptions;
use crate::error::{ErrorKind, Result};

static ORDINAL_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\.x?html?$").unwrap());

/// A converter chapter fragment found in the working archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSource {
    /// Full container path.
    pub path: String,
    /// Trailing number of the file name.
    pub ordinal: u64,
}

/// A chapter under its canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalChapter {
    /// 1-based position among the chapters.
    pub number: usize,
    /// Full container path, `<root>/text/chapter-N.xhtml`.
    pub path: String,
    pub title: String,
    pub markup: String,
    pub words: u64,
}

/// Output of [`SpineBuilder`]: the reading order and everything needed to
/// write it.
#[derive(Debug, Clone, Default)]
pub struct BuiltSpine {
    pub spine: Spine,
    pub chapters: Vec<CanonicalChapter>,
    /// Source paths that no canonical chapter occupies and must be deleted.
    pub removals: Vec<String>,
    pub word_count: u64,
}

/// Discovers converter fragments, normalizes them, and renumbers them as a
/// contiguous `chapter-1..N` sequence.
pub struct SpineBuilder<'a> {
    options: &'a BuildOptions,
    normalizer: Normalizer,
}

impl<'a> SpineBuilder<'a> {
    pub fn new(options: &'a BuildOptions) -> Result<Self> {
        let normalizer = Normalizer::new(&options.media_dir).or_raise(|| ErrorKind::Template)?;
        Ok(Self { options, normalizer })
    }

    /// Fragments under `<root>/text/` whose file name carries the chapter
    /// prefix and a trailing number, ordered by that number.
    pub fn discover<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> Vec<ChapterSource> {
        let directory = self.options.directory("text");
        let mut sources: Vec<_> = names
            .into_iter()
            .filter_map(|path| {
                let file = path.strip_prefix(directory.as_str())?;
                if file.contains('/') || !file.starts_with(self.options.chapter_prefix.as_str()) {
                    return None;
                }
                let Some(ordinal) = ORDINAL_REGEX.captures(file).and_then(|c| c[1].parse().ok()) else {
                    tracing::debug!(path, "fragment without an ordinal ignored");
                    return None;
                };
                Some(ChapterSource { path: path.to_string(), ordinal })
            })
            .collect();
        sources.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.path.cmp(&b.path)));
        sources
    }

    /// Canonical container path of the `number`th chapter.
    pub fn canonical_path(&self, number: usize) -> String {
        self.options.entry(format!("text/chapter-{number}.xhtml"))
    }

    /// Reads every discovered fragment from the session and builds the spine.
    ///
    /// Fragments that disappeared from the archive are skipped.
    #[instrument(skip_all, fields(sources, chapters))]
    pub fn build(&self, session: &mut PatchSession, dedication: bool) -> Result<BuiltSpine> {
        let names = session.names();
        let sources = self.discover(names.iter().map(String::as_str));
        tracing::Span::current().record("sources", sources.len());
        let mut fragments = Vec::with_capacity(sources.len());
        for source in sources {
            match session.read(&source.path) {
                Ok(bytes) => fragments.push((source, bytes)),
                Err(e) if matches!(&*e, bindery_archive::error::ErrorKind::NotFound(_)) => {
                    tracing::debug!(path = %source.path, "chapter candidate missing; skipped");
                },
                Err(e) => return Err(e).or_raise(|| ErrorKind::Archive),
            }
        }
        let built = self.assemble(fragments, dedication)?;
        tracing::Span::current().record("chapters", built.chapters.len());
        Ok(built)
    }

    /// Builds the spine from fragments already in source order.
    ///
    /// Fragments without a top-level heading are left out of the numbering;
    /// their source paths are still scheduled for deletion.
    pub fn assemble(&self, fragments: Vec<(ChapterSource, Vec<u8>)>, dedication: bool) -> Result<BuiltSpine> {
        let mut chapters = Vec::with_capacity(fragments.len());
        let mut sources = Vec::with_capacity(fragments.len());
        for (ChapterSource { path, .. }, bytes) in fragments {
            let normalized = self.normalizer.normalize(&bytes).or_raise(|| ErrorKind::Format(path.clone()))?;
            let Some(chapter) = normalized else {
                tracing::warn!(%path, "fragment has no heading; excluded from spine");
                sources.push(path);
                continue;
            };
            sources.push(path);
            let number = chapters.len() + 1;
            chapters.push(CanonicalChapter {
                number,
                path: self.canonical_path(number),
                words: bindery_chapter::count(&chapter.markup),
                title: chapter.title,
                markup: chapter.markup,
            });
        }

        let canonical: HashSet<&str> = chapters.iter().map(|c| c.path.as_str()).collect();
        let removals = sources.iter().filter(|path| !canonical.contains(path.as_str())).cloned().collect();
        let word_count = chapters.iter().map(|c| c.words).sum();

        let entries = dedication
            .then(Matter::dedication)
            .into_iter()
            .chain(chapters.iter().map(|c| Matter::chapter(c.title.as_str())))
            .collect();
        let spine = Spine::new(entries).or_raise(|| ErrorKind::Integrity("spine ordering".to_string()))?;
        Ok(BuiltSpine { spine, chapters, removals, word_count })
    }
}
