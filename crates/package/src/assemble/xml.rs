use exn::ResultExt;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{ErrorKind, Result};

pub(super) type Attributes<'a> = &'a [(&'a str, &'a str)];

/// Indented XML document writer. Text and attribute values are escaped.
pub(super) struct XmlWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub(super) fn new() -> Result<Self> {
        let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .or_raise(|| ErrorKind::Io)?;
        Ok(Self { writer })
    }

    pub(super) fn open(&mut self, name: &str, attributes: Attributes<'_>) -> Result<()> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Start(start)).or_raise(|| ErrorKind::Io)
    }

    pub(super) fn close(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name))).or_raise(|| ErrorKind::Io)
    }

    pub(super) fn empty(&mut self, name: &str, attributes: Attributes<'_>) -> Result<()> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Empty(start)).or_raise(|| ErrorKind::Io)
    }

    /// `<name ...>text</name>` on a single line.
    pub(super) fn element(&mut self, name: &str, attributes: Attributes<'_>, text: &str) -> Result<()> {
        self.open(name, attributes)?;
        self.writer.write_event(Event::Text(BytesText::new(text))).or_raise(|| ErrorKind::Io)?;
        self.close(name)
    }

    pub(super) fn finish(self) -> Result<String> {
        String::from_utf8(self.writer.into_inner()).or_raise(|| ErrorKind::Io)
    }
}

/// Unescaped value of an attribute, if present.
pub(crate) fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let Some(attribute) = element.try_get_attribute(name).or_raise(|| ErrorKind::Integrity(format!("@{name}")))?
    else {
        return Ok(None);
    };
    let value = attribute.unescape_value().or_raise(|| ErrorKind::Integrity(format!("@{name}")))?;
    Ok(Some(value.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_text_and_attributes() {
        let mut xml = XmlWriter::new().unwrap();
        xml.open("root", &[("lang", "en")]).unwrap();
        xml.element("title", &[("id", "a&b")], "Fish & <Chips>").unwrap();
        xml.empty("item", &[("href", "text/\"x\".xhtml")]).unwrap();
        xml.close("root").unwrap();
        let out = xml.finish().unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(out.contains("\t<title id=\"a&amp;b\">Fish &amp; &lt;Chips&gt;</title>"));
        assert!(out.contains("<item href=\"text/&quot;x&quot;.xhtml\"/>"));
    }
}
