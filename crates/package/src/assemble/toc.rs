use bindery_model::WorkMetadata;
use exn::ResultExt;
use quick_xml::Reader;
use quick_xml::events::Event;

use super::NavEntry;
use super::xml::{XmlWriter, attribute};
use crate::error::{ErrorKind, Result};

/// `has_chapters` decides where the bodymatter landmark points: the first
/// chapter, or the title page when there are none.
pub(super) fn write(metadata: &WorkMetadata, entries: &[NavEntry], has_chapters: bool) -> Result<String> {
    let mut xml = XmlWriter::new()?;
    xml.open(
        "html",
        &[
            ("xmlns", "http://www.w3.org/1999/xhtml"),
            ("xmlns:epub", "http://www.idpf.org/2007/ops"),
            ("epub:prefix", "z3998: http://www.daisy.org/z3998/2012/vocab/structure/, se: https://standardebooks.org/vocab/1.0"),
            ("xml:lang", metadata.language.as_str()),
        ],
    )?;
    xml.open("head", &[])?;
    xml.element("title", &[], "Table of Contents")?;
    xml.empty("link", &[("href", "css/core.css"), ("rel", "stylesheet"), ("type", "text/css")])?;
    xml.close("head")?;
    xml.open("body", &[("epub:type", "frontmatter")])?;

    xml.open("nav", &[("id", "toc"), ("epub:type", "toc")])?;
    xml.element("h2", &[("epub:type", "title")], "Table of Contents")?;
    xml.open("ol", &[])?;
    for entry in entries {
        xml.open("li", &[])?;
        xml.element("a", &[("href", entry.href.as_str())], &entry.title)?;
        xml.close("li")?;
    }
    xml.close("ol")?;
    xml.close("nav")?;

    let start = match has_chapters {
        true => entries.iter().find(|e| e.href.starts_with("text/chapter-")),
        false => None,
    }
    .or(entries.first());
    xml.open("nav", &[("id", "landmarks"), ("epub:type", "landmarks")])?;
    xml.element("h2", &[("epub:type", "title")], "Landmarks")?;
    xml.open("ol", &[])?;
    if let Some(start) = start {
        xml.open("li", &[])?;
        xml.element("a", &[("href", start.href.as_str()), ("epub:type", "bodymatter z3998:fiction")], &metadata.title)?;
        xml.close("li")?;
    }
    xml.close("ol")?;
    xml.close("nav")?;

    xml.close("body")?;
    xml.close("html")?;
    xml.finish()
}

/// `(href, label)` of every link in the `toc` nav, in document order.
pub(super) fn reading_order(toc: &str) -> Result<Vec<(String, String)>> {
    let mut reader = Reader::from_str(toc);
    reader.trim_text(true);
    let mut links = Vec::new();
    let mut in_toc = false;
    let mut link: Option<(String, String)> = None;
    loop {
        match reader.read_event().or_raise(|| ErrorKind::Integrity(super::TOC.into()))? {
            Event::Start(e) => match e.name().as_ref() {
                b"nav" => in_toc = attribute(&e, "epub:type")?.is_some_and(|t| t.split_whitespace().any(|t| t == "toc")),
                b"a" if in_toc => link = Some((attribute(&e, "href")?.unwrap_or_default(), String::new())),
                _ => {},
            },
            Event::Text(t) => {
                if let Some((_, label)) = link.as_mut() {
                    label.push_str(&t.unescape().or_raise(|| ErrorKind::Integrity(super::TOC.into()))?);
                }
            },
            Event::End(e) => match e.name().as_ref() {
                b"nav" => in_toc = false,
                b"a" => links.extend(link.take()),
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::super::reading_order as entries;
    use super::super::tests::{metadata, spine};
    use super::*;

    #[test]
    fn toc_and_landmarks() {
        let xml = write(&metadata(), &entries(&spine(true, &["One", "Two"])), true).unwrap();
        assert!(xml.contains("<nav id=\"toc\" epub:type=\"toc\">"));
        assert!(xml.contains("<a href=\"text/chapter-1.xhtml\" epub:type=\"bodymatter z3998:fiction\">T</a>"));
        let links = reading_order(&xml).unwrap();
        let hrefs: Vec<_> = links.iter().map(|(href, _)| href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec![
                "text/titlepage.xhtml",
                "text/dedication.xhtml",
                "text/chapter-1.xhtml",
                "text/chapter-2.xhtml",
                "text/colophon.xhtml",
            ]
        );
        assert_eq!(links[3].1, "Two");
    }

    #[test]
    fn landmarks_are_not_contents() {
        let xml = r#"<html><body>
            <nav epub:type="toc"><ol><li><a href="a.xhtml">A</a></li></ol></nav>
            <nav epub:type="landmarks"><ol><li><a href="b.xhtml">B</a></li></ol></nav>
        </body></html>"#;
        assert_eq!(reading_order(xml).unwrap(), vec![("a.xhtml".to_string(), "A".to_string())]);
    }
}
