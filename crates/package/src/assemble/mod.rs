//! Package documents: `content.opf`, `toc.ncx` and `toc.xhtml`.
//!
//! All three are built from one [`reading_order`] derived from the finished
//! [`Spine`], so they cannot disagree on numbering, dedication placement or
//! identifiers. [`PackageDocuments::verify`] re-reads the written documents
//! and checks that they still do.

mod ncx;
mod opf;
mod toc;
mod xml;

use std::collections::HashSet;

use bindery_model::{BackMatter, FrontMatter, Matter, Spine, WorkMetadata};
use time::OffsetDateTime;
use tracing::instrument;

use crate::BuildOptions;
use crate::error::{ErrorKind, Result};
use crate::media::media_type;

pub(crate) use self::opf::{read_metadata, reading_order as spine_hrefs, replace_item};
pub(crate) use self::xml::attribute;

pub const OPF: &str = "content.opf";
pub const NCX: &str = "toc.ncx";
pub const TOC: &str = "toc.xhtml";
pub const TITLEPAGE: &str = "text/titlepage.xhtml";
pub const COLOPHON: &str = "text/colophon.xhtml";
pub const DEDICATION: &str = "text/dedication.xhtml";

/// Directories below the package root whose files are listed as resources.
const RESOURCE_DIRS: [&str; 3] = ["css", "fonts", "images"];

/// One reading-order entry, shared by all three documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    /// Manifest item identifier.
    pub id: String,
    /// Path relative to the package root.
    pub href: String,
    pub title: String,
}

impl NavEntry {
    fn new(href: impl Into<String>, title: impl Into<String>) -> Self {
        let href = href.into();
        Self { id: item_id(&href), href, title: title.into() }
    }
}

/// Title page, dedication (when present), chapters and colophon, in order.
pub fn reading_order(spine: &Spine) -> Vec<NavEntry> {
    let titlepage = Matter::Front { content: FrontMatter::Titlepage, title: None };
    let colophon = Matter::Back { content: BackMatter::Colophon, title: None };
    let mut entries = Vec::with_capacity(spine.len() + 2);
    entries.push(NavEntry::new(TITLEPAGE, titlepage.title()));
    if let Some(dedication) = spine.dedication() {
        entries.push(NavEntry::new(DEDICATION, dedication.title()));
    }
    entries.extend(spine.chapters().map(|(n, matter)| NavEntry::new(format!("text/chapter-{n}.xhtml"), matter.title())));
    entries.push(NavEntry::new(COLOPHON, colophon.title()));
    entries
}

/// A static file listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: String,
    /// Path relative to the package root.
    pub href: String,
    pub media_type: &'static str,
    /// Flagged with the `cover-image` property.
    pub cover: bool,
}

impl Resource {
    /// Resources among archive entry names: files under the root's `css`,
    /// `fonts` and `images` directories with a known media type.
    ///
    /// Identifiers are unique across the manifest: a file name seen before
    /// gets a numeric suffix.
    pub fn collect<'n>(names: impl IntoIterator<Item = &'n str>, options: &BuildOptions) -> Vec<Self> {
        let root = format!("{}/", options.root.trim_matches('/'));
        let mut taken: HashSet<String> =
            [TOC, NCX, TITLEPAGE, COLOPHON, DEDICATION].into_iter().map(item_id).collect();
        names
            .into_iter()
            .filter_map(|name| name.strip_prefix(root.as_str()))
            .filter(|href| !href.ends_with('/'))
            .filter(|href| href.split_once('/').is_some_and(|(dir, _)| RESOURCE_DIRS.contains(&dir)))
            .filter_map(|href| {
                let Some(media_type) = media_type(href) else {
                    tracing::warn!(href, "unknown media type; left out of manifest");
                    return None;
                };
                let cover = href.starts_with("images/")
                    && href.rsplit('/').next().and_then(|f| f.split('.').next()) == Some("cover");
                let id = unique_id(item_id(href), &mut taken);
                Some(Self { id, href: href.to_string(), media_type, cover })
            })
            .collect()
    }
}

/// Manifest identifier for a root-relative path: its file name, reduced to
/// characters allowed in an XML ID and starting with a letter.
pub(crate) fn item_id(href: &str) -> String {
    let name = href.rsplit('/').next().unwrap_or(href);
    let id: String = name
        .chars()
        .map(|c| match c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
            true => c,
            false => '_',
        })
        .collect();
    match id.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => id,
        _ => format!("x-{id}"),
    }
}

/// `id`, or `id-2`, `id-3`... if it is already taken. The result is taken
/// on return.
pub(crate) fn unique_id(id: String, taken: &mut HashSet<String>) -> String {
    let mut candidate = id.clone();
    let mut n = 1;
    while taken.contains(&candidate) {
        n += 1;
        candidate = format!("{id}-{n}");
    }
    taken.insert(candidate.clone());
    candidate
}

/// The three generated package documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDocuments {
    pub opf: String,
    pub ncx: String,
    pub toc: String,
}

impl PackageDocuments {
    #[instrument(skip_all, fields(resources = resources.len(), entries))]
    pub fn new(
        metadata: &WorkMetadata,
        resources: &[Resource],
        spine: &Spine,
        modified: OffsetDateTime,
    ) -> Result<Self> {
        let entries = reading_order(spine);
        tracing::Span::current().record("entries", entries.len());
        let has_chapters = spine.chapter_count() > 0;
        Ok(Self {
            opf: opf::write(metadata, resources, &entries, modified)?,
            ncx: ncx::write(metadata, &entries)?,
            toc: toc::write(metadata, &entries, has_chapters)?,
        })
    }

    /// `(container path, contents)` for each document.
    pub fn entries(&self, options: &BuildOptions) -> [(String, &str); 3] {
        [
            (options.entry(OPF), self.opf.as_str()),
            (options.entry(NCX), self.ncx.as_str()),
            (options.entry(TOC), self.toc.as_str()),
        ]
    }

    /// Re-reads all three documents and checks they list the same reading
    /// order with the same labels. Returns the number of entries.
    #[instrument(skip_all, fields(entries))]
    pub fn verify(&self) -> Result<usize> {
        let spine = opf::reading_order(&self.opf)?;
        let navmap = ncx::reading_order(&self.ncx)?;
        let toc = toc::reading_order(&self.toc)?;

        let hrefs = |entries: &[(String, String)]| entries.iter().map(|(href, _)| href.clone()).collect::<Vec<_>>();
        if hrefs(&navmap) != spine {
            exn::bail!(ErrorKind::Integrity(format!("{NCX} lists {} entries, {OPF} {}", navmap.len(), spine.len())));
        }
        if hrefs(&toc) != spine {
            exn::bail!(ErrorKind::Integrity(format!("{TOC} lists {} entries, {OPF} {}", toc.len(), spine.len())));
        }
        if navmap != toc {
            exn::bail!(ErrorKind::Integrity(format!("{NCX} and {TOC} labels differ")));
        }
        tracing::Span::current().record("entries", spine.len());
        Ok(spine.len())
    }
}
