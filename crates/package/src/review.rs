//! Inspecting and patching finished packages.
//!
//! A [`Review`] locates the package document through
//! `META-INF/container.xml`, so it works on any EPUB whose layout follows the
//! container's rootfile rather than on [`BuildOptions`](crate::BuildOptions).

use std::path::{Path, PathBuf};

use bindery_archive::{Commit, PatchSession};
use bindery_model::WorkMetadata;
use exn::{OptionExt, ResultExt};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::instrument;

use crate::assemble::{self, attribute};
use crate::error::{ErrorKind, Result};
use crate::media::media_type;
use crate::publication::Source;

const CONTAINER: &str = "META-INF/container.xml";

/// Pages generated around the chapters, which do not count as prose.
const GENERATED_PAGES: [&str; 3] = [assemble::TITLEPAGE, assemble::DEDICATION, assemble::COLOPHON];

/// Outcome of [`Review::replace_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReplacement {
    /// Manifest identifier of the new image.
    pub id: String,
    /// Container path of the new image.
    pub path: String,
    /// Text documents whose image references were rewritten.
    pub documents: usize,
    pub commit: Commit,
}

/// A finished package opened for inspection or small in-place edits.
#[derive(Debug, Clone)]
pub struct Review {
    path: PathBuf,
}

impl Review {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata recorded in the package document, with the word count
    /// recomputed from the chapters in its reading order.
    #[instrument(skip_all, fields(path = %self.path.display(), word_count))]
    pub fn metadata(&self) -> Result<WorkMetadata> {
        let mut session = bindery_archive::open(&self.path).or_raise(|| ErrorKind::Archive)?;
        let metadata = read_metadata(&mut session);
        session.discard();
        let metadata = metadata?;
        if let Some(words) = metadata.word_count {
            tracing::Span::current().record("word_count", words);
        }
        Ok(metadata)
    }

    /// Swaps the image `images/<replace>` for a new image named `name`.
    ///
    /// The manifest item is pointed at the new file and every `img` in the
    /// text documents that referenced the old one is retargeted. All of it
    /// lands in one rewrite of the archive; on error nothing changes.
    #[instrument(skip_all, fields(path = %self.path.display(), replace, name))]
    pub fn replace_image(&self, source: impl Into<Source>, name: &str, replace: &str) -> Result<ImageReplacement> {
        let name = file_name(name)?;
        let replace = file_name(replace)?;
        let media_type = media_type(name)
            .filter(|t| t.starts_with("image/"))
            .ok_or_raise(|| ErrorKind::Format(format!("unsupported image type: {name}")))?;
        let bytes = source.into().into_bytes()?;

        let mut session = bindery_archive::open(&self.path).or_raise(|| ErrorKind::Archive)?;
        let (id, path, documents) = match stage_replacement(&mut session, bytes, name, replace, media_type) {
            Ok(staged) => staged,
            Err(e) => {
                let discarded = session.discard();
                tracing::warn!(discarded, "image replacement abandoned");
                return Err(e);
            },
        };
        let commit = session.close().or_raise(|| ErrorKind::Archive)?;
        tracing::debug!(%id, documents, "image replaced");
        Ok(ImageReplacement { id, path, documents, commit })
    }
}

/// The package document named by the container.
struct PackageDocument {
    path: String,
    opf: String,
}

impl PackageDocument {
    fn locate(session: &mut PatchSession) -> Result<Self> {
        let container = read_text(session, CONTAINER)?;
        let path = rootfile(&container)?;
        let opf = read_text(session, &path)?;
        Ok(Self { path, opf })
    }

    /// Container path of an href relative to the package document.
    fn resolve(&self, href: &str) -> String {
        match self.path.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{href}"),
            None => href.to_string(),
        }
    }
}

fn read_metadata(session: &mut PatchSession) -> Result<WorkMetadata> {
    let package = PackageDocument::locate(session)?;
    let patch = assemble::read_metadata(&package.opf)?;
    let mut metadata = WorkMetadata::try_from(patch).or_raise(|| ErrorKind::Metadata)?;
    let mut words = 0;
    for href in assemble::spine_hrefs(&package.opf)? {
        if GENERATED_PAGES.contains(&href.as_str()) {
            continue;
        }
        let path = package.resolve(&href);
        if !session.contains(&path) {
            tracing::warn!(%path, "reading order entry missing from archive");
            continue;
        }
        words += bindery_chapter::count(&read_text(session, &path)?);
    }
    metadata.word_count = Some(words);
    Ok(metadata)
}

fn stage_replacement(
    session: &mut PatchSession,
    bytes: Vec<u8>,
    name: &str,
    replace: &str,
    media_type: &str,
) -> Result<(String, String, usize)> {
    let package = PackageDocument::locate(session)?;
    let old = package.resolve(&format!("images/{replace}"));
    let href = format!("images/{name}");
    let path = package.resolve(&href);
    if !session.contains(&old) {
        exn::bail!(ErrorKind::NotFound(old));
    }
    if path != old && session.contains(&path) {
        exn::bail!(ErrorKind::Format(format!("{path} already exists")));
    }
    let (opf, id) = assemble::replace_item(&package.opf, &format!("images/{replace}"), &href, media_type)?;

    if path != old {
        session.queue_delete(&old).or_raise(|| ErrorKind::Archive)?;
    }
    session.queue_write(&path, bytes).or_raise(|| ErrorKind::Archive)?;
    session.queue_write(&package.path, opf).or_raise(|| ErrorKind::Archive)?;

    let text = package.resolve("text/");
    let mut documents = 0;
    for document in session.names().into_iter().filter(|n| n.starts_with(&text) && n.ends_with(".xhtml")) {
        let markup = read_text(session, &document)?;
        if let Some(markup) = retarget_images(&markup, replace, name, &document)? {
            session.queue_write(&document, markup).or_raise(|| ErrorKind::Archive)?;
            documents += 1;
        }
    }
    Ok((id, path, documents))
}

fn read_text(session: &mut PatchSession, path: &str) -> Result<String> {
    if !session.contains(path) {
        exn::bail!(ErrorKind::NotFound(path.to_string()));
    }
    let bytes = session.read(path).or_raise(|| ErrorKind::Archive)?;
    String::from_utf8(bytes).or_raise(|| ErrorKind::Format(path.to_string()))
}

fn rootfile(container: &str) -> Result<String> {
    let mut reader = Reader::from_str(container);
    reader.trim_text(true);
    loop {
        match reader.read_event().or_raise(|| ErrorKind::Format(CONTAINER.into()))? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(&e, "full-path")? {
                    return Ok(path);
                }
            },
            Event::Eof => exn::bail!(ErrorKind::NotFound(format!("rootfile in {CONTAINER}"))),
            _ => {},
        }
    }
}

fn file_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', '\\']) {
        exn::bail!(ErrorKind::Format(format!("not a file name: {name:?}")));
    }
    Ok(name)
}

/// Rewrites `img@src` values whose file name is `from` to use `to`.
/// Returns `None` when the document holds no such reference.
fn retarget_images(markup: &str, from: &str, to: &str, document: &str) -> Result<Option<String>> {
    let invalid = || ErrorKind::Format(document.to_string());
    let mut reader = Reader::from_str(markup);
    let mut writer = Writer::new(Vec::new());
    let mut changed = false;
    loop {
        let event = match reader.read_event().or_raise(invalid)? {
            Event::Eof => break,
            Event::Empty(e) if e.name().as_ref() == b"img" => match retarget_src(&e, from, to, document)? {
                Some(img) => {
                    changed = true;
                    Event::Empty(img)
                },
                None => Event::Empty(e),
            },
            Event::Start(e) if e.name().as_ref() == b"img" => match retarget_src(&e, from, to, document)? {
                Some(img) => {
                    changed = true;
                    Event::Start(img)
                },
                None => Event::Start(e),
            },
            event => event,
        };
        writer.write_event(event).or_raise(|| ErrorKind::Io)?;
    }
    if !changed {
        return Ok(None);
    }
    String::from_utf8(writer.into_inner()).map(Some).or_raise(|| ErrorKind::Io)
}

fn retarget_src(element: &BytesStart<'_>, from: &str, to: &str, document: &str) -> Result<Option<BytesStart<'static>>> {
    let Some(src) = attribute(element, "src")? else {
        return Ok(None);
    };
    let Some(prefix) = src.strip_suffix(from).filter(|p| p.is_empty() || p.ends_with('/')) else {
        return Ok(None);
    };
    let src = format!("{prefix}{to}");
    let mut img = BytesStart::new("img");
    for attr in element.attributes() {
        let attr = attr.or_raise(|| ErrorKind::Format(document.to_string()))?;
        match attr.key.as_ref() {
            b"src" => img.push_attribute(("src", src.as_str())),
            _ => img.push_attribute(attr),
        }
    }
    Ok(Some(img))
}
