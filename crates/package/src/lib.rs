//! Assembles a converter-produced EPUB into a consistent EPUB 3 package.
//!
//! A [`Publication`] collects metadata, the source document, an optional
//! cover and dedication. [`Publication::build`] hands the document to a
//! [`Converter`] and then patches the resulting archive in one transactional
//! rewrite:
//!
//! 1. bundled styles and images, the container pointer, title page and
//!    colophon are written,
//! 2. chapter fragments are normalized and renumbered `chapter-1..N`,
//! 3. converter media is moved under `images/`,
//! 4. `content.opf`, `toc.ncx` and `toc.xhtml` are generated from the same
//!    reading order and cross-checked before anything is committed.
//!
//! A finished package can be inspected or patched afterwards with a
//! [`Review`].
//!
//! ```no_run
//! use bindery_model::MetadataPatch;
//! use bindery_package::{BuildOptions, Pandoc, Publication};
//!
//! # fn main() -> bindery_package::error::Result<()> {
//! let mut work = Publication::new(BuildOptions::from_env()?);
//! work.set_metadata(MetadataPatch {
//!     title: Some("Usan Abasi's Lament".into()),
//!     creator: Some(vec!["Gavin Chait".into()]),
//!     ..Default::default()
//! })?;
//! work.set_document(std::path::Path::new("lament.docx"))?;
//! work.set_dedication(["For those who leave."])?;
//! let report = work.build(&Pandoc::discover()?, "lament.epub")?;
//! println!("{} words in {} chapters", report.word_count, report.chapters);
//! # Ok(())
//! # }
//! ```

pub mod assemble;
mod assets;
mod converter;
pub mod error;
mod media;
mod options;
mod pages;
mod publication;
mod review;
mod spine;

pub use self::assets::Builtins;
pub use self::converter::{Converter, Pandoc};
pub use self::media::media_type;
pub use self::options::{BuildOptions, ENV_PREFIX};
pub use self::pages::Pages;
pub use self::publication::{BuildReport, COVER_EXTENSIONS, Publication, Source};
pub use self::review::{ImageReplacement, Review};
pub use self::spine::{BuiltSpine, CanonicalChapter, ChapterSource, SpineBuilder};
