//! Gathering a work's inputs and building it into a package.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bindery_archive::{Commit, OpenOptions, PatchSession};
use bindery_model::{Contributor, MetadataPatch, WorkMetadata};
use exn::{OptionExt, ResultExt};
use time::OffsetDateTime;
use tracing::instrument;

use crate::assemble::{self, PackageDocuments, Resource};
use crate::assets::Builtins;
use crate::converter::Converter;
use crate::error::{ErrorKind, Result};
use crate::pages::Pages;
use crate::spine::SpineBuilder;
use crate::BuildOptions;

/// Image extensions accepted for a cover.
pub const COVER_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "svg"];

/// Bytes supplied by the caller: a file, raw bytes or base64 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
    /// Base64 text, optionally with a `data:<type>;base64,` prefix.
    Base64(String),
}

impl Source {
    pub fn base64(text: impl Into<String>) -> Self {
        Self::Base64(text.into())
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Source::Path(path) => match std::fs::read(&path) {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == IoErrorKind::NotFound => {
                    exn::bail!(ErrorKind::NotFound(path.display().to_string()))
                },
                Err(e) => Err(e).or_raise(|| ErrorKind::Io),
            },
            Source::Bytes(bytes) => Ok(bytes),
            Source::Base64(text) => {
                let text = text.trim();
                let payload = match text.strip_prefix("data:").and_then(|rest| rest.split_once(";base64,")) {
                    Some((_, payload)) => payload,
                    None => text,
                };
                BASE64_STANDARD.decode(payload).or_raise(|| ErrorKind::Format("invalid base64".into()))
            },
        }
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}
impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}
impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}
impl From<&[u8]> for Source {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub output: PathBuf,
    /// Aggregate word count of all chapters.
    pub word_count: u64,
    pub chapters: usize,
    pub dedication: bool,
    pub commit: Commit,
}

struct Cover {
    bytes: Vec<u8>,
    extension: String,
}

/// A creative work being prepared for publication.
///
/// Metadata must be set before anything else; every other setter raises
/// [`Precondition`](ErrorKind::Precondition) until it is.
pub struct Publication {
    options: BuildOptions,
    metadata: Option<WorkMetadata>,
    document: Option<Vec<u8>>,
    cover: Option<Cover>,
    dedication: Option<Vec<String>>,
}

impl Publication {
    pub fn new(options: BuildOptions) -> Self {
        Self { options, metadata: None, document: None, cover: None, dedication: None }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn metadata(&self) -> Option<&WorkMetadata> {
        self.metadata.as_ref()
    }

    fn metadata_mut(&mut self) -> Result<&mut WorkMetadata> {
        self.metadata.as_mut().ok_or_raise(|| ErrorKind::Precondition("metadata"))
    }

    /// Creates the metadata record, or merges the patch into an existing one.
    pub fn set_metadata(&mut self, patch: MetadataPatch) -> Result<()> {
        match self.metadata.as_mut() {
            Some(metadata) => metadata.apply(patch).or_raise(|| ErrorKind::Metadata),
            None => {
                self.metadata = Some(WorkMetadata::try_from(patch).or_raise(|| ErrorKind::Metadata)?);
                Ok(())
            },
        }
    }

    pub fn add_contributor(&mut self, contributor: Contributor) -> Result<()> {
        self.metadata_mut()?.contributor.push(contributor);
        Ok(())
    }

    /// Replaces the colophon's copyright paragraphs.
    pub fn set_rights<S: Into<String>>(&mut self, paragraphs: impl IntoIterator<Item = S>) -> Result<()> {
        self.metadata_mut()?.long_rights = paragraphs.into_iter().map(Into::into).collect();
        Ok(())
    }

    /// An empty list removes the dedication.
    pub fn set_dedication<S: Into<String>>(&mut self, paragraphs: impl IntoIterator<Item = S>) -> Result<()> {
        self.metadata_mut()?;
        let paragraphs: Vec<String> = paragraphs.into_iter().map(Into::into).collect();
        self.dedication = (!paragraphs.is_empty()).then_some(paragraphs);
        Ok(())
    }

    /// The `docx` document handed to the converter.
    #[instrument(skip_all, fields(size))]
    pub fn set_document(&mut self, source: impl Into<Source>) -> Result<()> {
        self.metadata_mut()?;
        let bytes = source.into().into_bytes()?;
        tracing::Span::current().record("size", bytes.len());
        self.document = Some(bytes);
        Ok(())
    }

    /// Cover image, stored as `images/cover.<extension>`.
    #[instrument(skip_all, fields(extension, size))]
    pub fn set_cover(&mut self, source: impl Into<Source>, extension: &str) -> Result<()> {
        self.metadata_mut()?;
        let extension = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        tracing::Span::current().record("extension", extension.as_str());
        if !COVER_EXTENSIONS.contains(&extension.as_str()) {
            exn::bail!(ErrorKind::Format(format!("unsupported cover image type: {extension}")));
        }
        let bytes = source.into().into_bytes()?;
        tracing::Span::current().record("size", bytes.len());
        self.cover = Some(Cover { bytes, extension });
        Ok(())
    }

    /// Runs the converter to produce the working archive at `output`, then
    /// patches it into the finished package in a single rewrite.
    ///
    /// If anything fails after conversion, the converter's archive is left
    /// as it was.
    #[instrument(skip_all, fields(output = %output.as_ref().display(), word_count, chapters))]
    pub fn build(&mut self, converter: &impl Converter, output: impl AsRef<Path>) -> Result<BuildReport> {
        let output = output.as_ref();
        self.metadata_mut()?;
        let document = self.document.as_deref().ok_or_raise(|| ErrorKind::Precondition("document"))?;
        converter.convert(document, output)?;

        let mut session = OpenOptions::new()
            .compression(self.options.compression)
            .open(output)
            .or_raise(|| ErrorKind::Archive)?;
        let (word_count, chapters) = match self.stage(&mut session) {
            Ok(staged) => staged,
            Err(e) => {
                let discarded = session.discard();
                tracing::warn!(discarded, "build failed; archive left as converted");
                return Err(e);
            },
        };
        let commit = session.close().or_raise(|| ErrorKind::Archive)?;
        tracing::Span::current().record("word_count", word_count).record("chapters", chapters);
        Ok(BuildReport {
            output: output.to_path_buf(),
            word_count,
            chapters,
            dedication: self.dedication.is_some(),
            commit,
        })
    }

    /// Stages every change of a build. Returns the word count and the
    /// number of chapters.
    fn stage(&mut self, session: &mut PatchSession) -> Result<(u64, usize)> {
        let options = &self.options;
        let metadata = self.metadata.as_mut().ok_or_raise(|| ErrorKind::Precondition("metadata"))?;
        let pages = Pages::new()?;
        let write = |session: &mut PatchSession, path: String, data: Vec<u8>| {
            session.queue_write(path, data).or_raise(|| ErrorKind::Archive)
        };

        for (path, data) in Builtins::entries(options) {
            write(session, path, data.into_owned())?;
        }
        write(session, "META-INF/container.xml".to_string(), pages.container(&options.root)?.into_bytes())?;
        write(session, options.entry(assemble::TITLEPAGE), pages.titlepage(metadata)?.into_bytes())?;
        write(session, options.entry(assemble::COLOPHON), pages.colophon(metadata)?.into_bytes())?;
        if let Some(cover) = &self.cover {
            write(session, options.entry(format!("images/cover.{}", cover.extension)), cover.bytes.clone())?;
        }
        if let Some(paragraphs) = &self.dedication {
            write(session, options.entry(assemble::DEDICATION), pages.dedication(metadata, paragraphs)?.into_bytes())?;
        }

        let built = SpineBuilder::new(options)?.build(session, self.dedication.is_some())?;
        for chapter in &built.chapters {
            write(session, chapter.path.clone(), chapter.markup.clone().into_bytes())?;
        }
        for path in &built.removals {
            session.queue_delete(path).or_raise(|| ErrorKind::Archive)?;
        }
        move_media(session, options)?;
        for removal in &options.removals {
            let path = options.entry(removal);
            if !session.queue_delete(&path).or_raise(|| ErrorKind::Archive)? {
                tracing::debug!(%path, "leftover not present; nothing to remove");
            }
        }

        metadata.word_count = Some(built.word_count);
        let names = session.names();
        let resources = Resource::collect(names.iter().map(String::as_str), options);
        let documents = PackageDocuments::new(metadata, &resources, &built.spine, OffsetDateTime::now_utc())?;
        documents.verify()?;
        for (path, contents) in documents.entries(options) {
            write(session, path, contents.as_bytes().to_vec())?;
        }
        Ok((built.word_count, built.chapters.len()))
    }
}

/// Moves converter assets from the media directory to `images`.
fn move_media(session: &mut PatchSession, options: &BuildOptions) -> Result<usize> {
    let media = options.directory(&options.media_dir);
    let mut moved = 0;
    for path in session.names() {
        let Some(relative) = path.strip_prefix(media.as_str()).filter(|r| !r.is_empty() && !r.ends_with('/')) else {
            continue;
        };
        let bytes = match session.read(&path) {
            Ok(bytes) => bytes,
            Err(e) if matches!(&*e, bindery_archive::error::ErrorKind::NotFound(_)) => continue,
            Err(e) => return Err(e).or_raise(|| ErrorKind::Archive),
        };
        session.queue_write(options.entry(format!("images/{relative}")), bytes).or_raise(|| ErrorKind::Archive)?;
        session.queue_delete(&path).or_raise(|| ErrorKind::Archive)?;
        moved += 1;
    }
    // Directory entries, if the converter wrote any.
    for path in session.names().into_iter().filter(|p| p.starts_with(media.as_str()) && p.ends_with('/')) {
        session.queue_delete(&path).or_raise(|| ErrorKind::Archive)?;
    }
    tracing::debug!(moved, "media moved to images");
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn publication() -> Publication {
        let mut publication = Publication::new(BuildOptions::default());
        publication
            .set_metadata(MetadataPatch { title: Some("T".into()), creator: Some(vec!["A".into()]), ..Default::default() })
            .unwrap();
        publication
    }

    #[test]
    fn setters_require_metadata() {
        let mut publication = Publication::new(BuildOptions::default());
        let precondition = |err: crate::error::Error| *err == ErrorKind::Precondition("metadata");
        assert!(precondition(publication.set_document(b"doc".as_slice()).unwrap_err()));
        assert!(precondition(publication.set_cover(b"img".as_slice(), "png").unwrap_err()));
        assert!(precondition(publication.set_dedication(["For Ada."]).unwrap_err()));
        assert!(precondition(publication.set_rights(["Mine."]).unwrap_err()));
        assert!(precondition(publication.add_contributor(Contributor::new(bindery_model::Role::Editor, "E", "")).unwrap_err()));
        let converter = |_: &[u8], _: &Path| -> Result<()> { Ok(()) };
        assert!(precondition(publication.build(&converter, "unused.epub").unwrap_err()));
    }

    #[test]
    fn metadata_requires_title_and_creator() {
        let mut publication = Publication::new(BuildOptions::default());
        let err = publication.set_metadata(MetadataPatch { title: Some("T".into()), ..Default::default() }).unwrap_err();
        assert_eq!(*err, ErrorKind::Metadata);
        assert!(publication.metadata().is_none());
    }

    #[test]
    fn metadata_patches_merge() {
        let mut publication = publication();
        publication.set_metadata(MetadataPatch { language: Some("fr".into()), ..Default::default() }).unwrap();
        let metadata = publication.metadata().unwrap();
        assert_eq!(metadata.title, "T");
        assert_eq!(metadata.language, "fr");
    }

    #[test]
    fn build_requires_document() {
        let mut publication = publication();
        let converter = |_: &[u8], _: &Path| -> Result<()> { panic!("converter must not run") };
        let err = publication.build(&converter, "unused.epub").unwrap_err();
        assert_eq!(*err, ErrorKind::Precondition("document"));
    }

    #[test]
    fn missing_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.docx");
        let err = publication().set_document(missing.as_path()).unwrap_err();
        assert_eq!(*err, ErrorKind::NotFound(missing.display().to_string()));
    }

    #[rstest]
    #[case("jpg")]
    #[case(".PNG")]
    #[case("svg")]
    fn cover_extensions(#[case] extension: &str) {
        assert!(publication().set_cover(b"img".as_slice(), extension).is_ok());
    }

    #[rstest]
    #[case("tiff")]
    #[case("")]
    #[case("exe")]
    fn unsupported_cover_extensions(#[case] extension: &str) {
        let err = publication().set_cover(b"img".as_slice(), extension).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Format(_)));
    }

    #[rstest]
    #[case("aGVsbG8=")]
    #[case("data:image/png;base64,aGVsbG8=")]
    #[case("  data:application/vnd.openxmlformats-officedocument.wordprocessingml.document;base64,aGVsbG8=\n")]
    fn base64_sources(#[case] text: &str) {
        assert_eq!(Source::base64(text).into_bytes().unwrap(), b"hello");
    }

    #[test]
    fn invalid_base64() {
        let err = Source::base64("data:image/png;base64,not base64!").into_bytes().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Format(_)));
    }

    #[test]
    fn path_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("work.docx");
        std::fs::write(&path, b"docx").unwrap();
        assert_eq!(Source::from(path).into_bytes().unwrap(), b"docx");
    }

    #[test]
    fn empty_dedication_clears() {
        let mut publication = publication();
        publication.set_dedication(["For Ada."]).unwrap();
        assert!(publication.dedication.is_some());
        publication.set_dedication(Vec::<String>::new()).unwrap();
        assert!(publication.dedication.is_none());
    }
}
