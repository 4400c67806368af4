use exn::ResultExt;
use quick_xml::escape::escape;
use scraper::{ElementRef, Html, Node};
use tracing::instrument;
use upon::{Engine, Template};

use crate::consts::{BODY_SELECTOR, HEADING_SELECTOR, SECTION_SELECTOR, TITLE_SELECTOR};
use crate::error::{ErrorKind, Result};
use crate::template;
use crate::xhtml::{self, AssetRewrite};

const CHAPTER_TEMPLATE: &str = "chapter.xhtml";

/// A chapter reshaped into the canonical chapter template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Text of the fragment's top-level heading.
    pub title: String,
    /// Complete XHTML document.
    pub markup: String,
}

/// Reshapes converter-produced chapter fragments into the canonical template.
///
/// Compiles the template once; reuse the normalizer for every chapter of a
/// build.
pub struct Normalizer {
    engine: Engine<'static>,
    template: Template<'static>,
    rewrite: AssetRewrite,
}

impl Normalizer {
    /// `media_dir` is the converter's asset folder, whose references are
    /// rewritten to point at `images`.
    pub fn new(media_dir: impl AsRef<str>) -> Result<Self> {
        let engine = template::engine();
        let template = template::compile(&engine, CHAPTER_TEMPLATE)?;
        Ok(Self { engine, template, rewrite: AssetRewrite::new(media_dir) })
    }

    /// Normalizes one fragment.
    ///
    /// Returns `Ok(None)` when the fragment has no top-level heading: it is
    /// not a chapter and must be left out of the reading order.
    #[instrument(skip_all, fields(size = source.len(), title))]
    pub fn normalize(&self, source: &[u8]) -> Result<Option<Chapter>> {
        let text = std::str::from_utf8(source).or_raise(|| ErrorKind::MalformedMarkup("invalid UTF-8".into()))?;
        if !text.trim_start_matches('\u{feff}').trim_start().starts_with('<') {
            exn::bail!(ErrorKind::MalformedMarkup("no markup found".into()));
        }
        let document = Html::parse_document(text);

        let title = document.select(&HEADING_SELECTOR).next().map(|h| collapse(h.text())).unwrap_or_default();
        if title.is_empty() {
            tracing::debug!("fragment has no top-level heading");
            return Ok(None);
        }
        tracing::Span::current().record("title", title.as_str());

        let body = match document.select(&SECTION_SELECTOR).next() {
            Some(section) => self.section_body(section),
            None => document
                .select(&BODY_SELECTOR)
                .next()
                .map(|body| xhtml::inner(body, Some(&self.rewrite)))
                .unwrap_or_default(),
        };
        let document_title = document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|t| collapse(t.text()))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| title.clone());

        let markup = self
            .template
            .render(&self.engine, upon::value! { title: document_title, body: body })
            .to_string()
            .or_raise(|| ErrorKind::Template(CHAPTER_TEMPLATE.to_string()))?;
        Ok(Some(Chapter { title, markup }))
    }

    /// Content of the heading section followed by everything after it at the
    /// same level, such as the footnotes section that notes link into.
    fn section_body(&self, section: ElementRef<'_>) -> String {
        let mut body = xhtml::inner(section, Some(&self.rewrite));
        for sibling in section.next_siblings() {
            match sibling.value() {
                Node::Text(text) if !text.trim().is_empty() => body.push_str(&escape(&**text)),
                Node::Element(_) => {
                    if let Some(element) = ElementRef::wrap(sibling) {
                        body.push_str(&xhtml::outer(element, Some(&self.rewrite)));
                    }
                },
                _ => {},
            }
        }
        body
    }
}

fn collapse<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}
