use bindery_model::WorkMetadata;
use exn::ResultExt;
use quick_xml::Reader;
use quick_xml::events::Event;

use super::NavEntry;
use super::xml::{XmlWriter, attribute};
use crate::error::{ErrorKind, Result};

pub(super) fn write(metadata: &WorkMetadata, entries: &[NavEntry]) -> Result<String> {
    let mut xml = XmlWriter::new()?;
    xml.open(
        "ncx",
        &[
            ("xmlns", "http://www.daisy.org/z3986/2005/ncx/"),
            ("version", "2005-1"),
            ("xml:lang", metadata.language.as_str()),
        ],
    )?;
    xml.open("head", &[])?;
    xml.empty("meta", &[("name", "dtb:uid"), ("content", metadata.identifier.as_str())])?;
    xml.empty("meta", &[("name", "dtb:depth"), ("content", "1")])?;
    xml.empty("meta", &[("name", "dtb:totalPageCount"), ("content", "0")])?;
    xml.empty("meta", &[("name", "dtb:maxPageNumber"), ("content", "0")])?;
    xml.close("head")?;
    xml.open("docTitle", &[])?;
    xml.element("text", &[], &metadata.title)?;
    xml.close("docTitle")?;

    xml.open("navMap", &[])?;
    for (i, entry) in entries.iter().enumerate() {
        let order = (i + 1).to_string();
        let id = format!("navpoint-{order}");
        xml.open("navPoint", &[("id", id.as_str()), ("playOrder", order.as_str())])?;
        xml.open("navLabel", &[])?;
        xml.element("text", &[], &entry.title)?;
        xml.close("navLabel")?;
        xml.empty("content", &[("src", entry.href.as_str())])?;
        xml.close("navPoint")?;
    }
    xml.close("navMap")?;
    xml.close("ncx")?;
    xml.finish()
}

/// `(src, label)` of every nav point, in document order.
pub(super) fn reading_order(ncx: &str) -> Result<Vec<(String, String)>> {
    let mut reader = Reader::from_str(ncx);
    reader.trim_text(true);
    let mut points = Vec::new();
    let (mut in_point, mut in_label) = (false, false);
    let (mut src, mut label) = (None, String::new());
    loop {
        match reader.read_event().or_raise(|| ErrorKind::Integrity(super::NCX.into()))? {
            Event::Start(e) => match e.name().as_ref() {
                b"navPoint" => {
                    in_point = true;
                    src = None;
                    label.clear();
                },
                b"text" if in_point => in_label = true,
                _ => {},
            },
            Event::Empty(e) if in_point && e.name().as_ref() == b"content" => src = attribute(&e, "src")?,
            Event::Text(t) if in_label => {
                let text = t.unescape().or_raise(|| ErrorKind::Integrity(super::NCX.into()))?;
                label.push_str(&text);
            },
            Event::End(e) => match e.name().as_ref() {
                b"text" => in_label = false,
                b"navPoint" => {
                    in_point = false;
                    let Some(src) = src.take() else {
                        exn::bail!(ErrorKind::Integrity(format!("nav point {} has no content", points.len() + 1)));
                    };
                    points.push((src, std::mem::take(&mut label)));
                },
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::super::reading_order as entries;
    use super::super::tests::{metadata, spine};
    use super::*;

    #[test]
    fn navmap() {
        let xml = write(&metadata(), &entries(&spine(true, &["Fish & Chips"]))).unwrap();
        assert!(xml.contains("<meta name=\"dtb:uid\" content=\"urn:uuid:0b3e1d5c-5f7a-4a64-9c1b-1f0e7d2a9c11\"/>"));
        assert!(xml.contains("<docTitle>"));
        assert!(xml.contains("<navPoint id=\"navpoint-3\" playOrder=\"3\">"));
        assert_eq!(
            reading_order(&xml).unwrap(),
            vec![
                ("text/titlepage.xhtml".to_string(), "Title page".to_string()),
                ("text/dedication.xhtml".to_string(), "Dedication".to_string()),
                ("text/chapter-1.xhtml".to_string(), "Fish & Chips".to_string()),
                ("text/colophon.xhtml".to_string(), "Colophon".to_string()),
            ]
        );
    }

    #[test]
    fn nav_point_without_content() {
        let xml = "<ncx><navMap><navPoint><navLabel><text>x</text></navLabel></navPoint></navMap></ncx>";
        assert!(reading_order(xml).is_err());
    }
}
