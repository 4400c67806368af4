//! Static pages generated from metadata: title page, colophon, dedication and
//! the container pointer.

use bindery_chapter::template;
use bindery_model::WorkMetadata;
use exn::ResultExt;
use tracing::instrument;
use upon::{Engine, Template, Value};

use crate::error::{ErrorKind, Result};

/// Compiled page templates, reusable across renders.
pub struct Pages {
    engine: Engine<'static>,
    titlepage: Template<'static>,
    colophon: Template<'static>,
    dedication: Template<'static>,
    container: Template<'static>,
}

impl Pages {
    pub fn new() -> Result<Self> {
        let engine = template::engine();
        let compile = |name| template::compile(&engine, name).or_raise(|| ErrorKind::Template);
        Ok(Self {
            titlepage: compile("titlepage.xhtml")?,
            colophon: compile("colophon.xhtml")?,
            dedication: compile("dedication.xhtml")?,
            container: compile("container.xml")?,
            engine,
        })
    }

    pub fn titlepage(&self, metadata: &WorkMetadata) -> Result<String> {
        self.render(
            &self.titlepage,
            upon::value! {
                language: &metadata.language,
                title: &metadata.title,
                creator: metadata.creator_display(),
            },
        )
    }

    /// Contributors without a year are credited with the work's year.
    #[instrument(skip_all, fields(contributors = metadata.contributor.len()))]
    pub fn colophon(&self, metadata: &WorkMetadata) -> Result<String> {
        let contributors = metadata
            .contributor
            .iter()
            .map(|c| {
                upon::value! {
                    role: c.role.to_string(),
                    name: &c.name,
                    year: i64::from(c.year.unwrap_or(metadata.year())),
                    terms: &c.terms,
                }
            })
            .collect();
        let rights = metadata.rights_paragraphs().into_iter().map(Value::from).collect();
        self.render(
            &self.colophon,
            upon::value! {
                language: &metadata.language,
                title: &metadata.title,
                creator: metadata.creator_display(),
                year: i64::from(metadata.year()),
                work_uri: metadata.work_uri.as_deref(),
                rights: Value::List(rights),
                publisher: metadata.publisher.as_deref(),
                publisher_uri: metadata.publisher_uri.as_deref(),
                contributors: Value::List(contributors),
            },
        )
    }

    pub fn dedication(&self, metadata: &WorkMetadata, paragraphs: &[String]) -> Result<String> {
        let paragraphs = paragraphs.iter().map(|p| Value::from(p.as_str())).collect();
        self.render(
            &self.dedication,
            upon::value! {
                language: &metadata.language,
                paragraphs: Value::List(paragraphs),
            },
        )
    }

    /// `META-INF/container.xml` pointing at `<root>/content.opf`.
    pub fn container(&self, root: &str) -> Result<String> {
        self.render(&self.container, upon::value! { root: root.trim_matches('/') })
    }

    fn render(&self, template: &Template<'static>, value: Value) -> Result<String> {
        template.render(&self.engine, value).to_string().or_raise(|| ErrorKind::Template)
    }
}
