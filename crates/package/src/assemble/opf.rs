use std::collections::{HashMap, HashSet};

use bindery_model::{Contributor, MetadataPatch, Role, WorkMetadata};
use exn::ResultExt;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use super::xml::{XmlWriter, attribute};
use super::{NCX, NavEntry, OPF, Resource, TOC, item_id, unique_id};
use crate::error::{ErrorKind, Result};

const XHTML: &str = "application/xhtml+xml";
const COLOPHON_NOTE: &str = "For full license information see the Colophon file included at the end of this ebook.";

pub(super) fn write(
    metadata: &WorkMetadata,
    resources: &[Resource],
    entries: &[NavEntry],
    modified: OffsetDateTime,
) -> Result<String> {
    let modified = modified
        .to_offset(UtcOffset::UTC)
        .replace_nanosecond(0)
        .or_raise(|| ErrorKind::Format("modification time".into()))?
        .format(&Rfc3339)
        .or_raise(|| ErrorKind::Format("modification time".into()))?;

    let mut xml = XmlWriter::new()?;
    xml.open(
        "package",
        &[
            ("xmlns", "http://www.idpf.org/2007/opf"),
            ("dir", "ltr"),
            ("prefix", "se: https://standardebooks.org/vocab/1.0"),
            ("unique-identifier", "uid"),
            ("version", "3.0"),
            ("xml:lang", metadata.language.as_str()),
        ],
    )?;

    xml.open("metadata", &[("xmlns:dc", "http://purl.org/dc/elements/1.1/")])?;
    xml.element("dc:identifier", &[("id", "uid")], &metadata.identifier)?;
    xml.element("dc:date", &[], &format!("{}T00:00:00Z", metadata.iso_date()))?;
    xml.element("meta", &[("property", "dcterms:modified")], &modified)?;
    xml.element("dc:rights", &[], &format!("{} {COLOPHON_NOTE}", metadata.rights))?;
    if let Some(publisher) = &metadata.publisher {
        xml.element("dc:publisher", &[("id", "publisher")], publisher)?;
        xml.element("meta", &[("property", "file-as"), ("refines", "#publisher")], publisher)?;
    }
    xml.element("dc:title", &[("id", "title")], &metadata.title)?;
    xml.element("meta", &[("property", "file-as"), ("refines", "#title")], &metadata.title)?;
    for (i, subject) in metadata.subject.iter().enumerate() {
        xml.element("dc:subject", &[("id", format!("subject-{}", i + 1).as_str())], subject)?;
    }
    if let Some(description) = &metadata.description {
        xml.element("dc:description", &[("id", "description")], description)?;
    }
    if let Some(long_description) = &metadata.long_description {
        let refines: &[(&str, &str)] = match metadata.description {
            Some(_) => &[("id", "long-description"), ("property", "se:long-description"), ("refines", "#description")],
            None => &[("id", "long-description"), ("property", "se:long-description")],
        };
        xml.element("meta", refines, long_description)?;
    }
    xml.element("dc:language", &[], &metadata.language)?;
    if let Some(words) = metadata.word_count {
        xml.element("meta", &[("property", "se:word-count")], &words.to_string())?;
    }
    for (i, creator) in metadata.creator.iter().enumerate() {
        let id = format!("author-{}", i + 1);
        let refines = format!("#{id}");
        xml.element("dc:creator", &[("id", id.as_str())], creator)?;
        xml.element("meta", &[("property", "file-as"), ("refines", refines.as_str())], creator)?;
        xml.element("meta", &[("property", "role"), ("refines", refines.as_str()), ("scheme", "marc:relators")], "aut")?;
    }
    for (i, contributor) in metadata.contributor.iter().enumerate() {
        let id = format!("{}-{}", contributor.role.as_str(), i + 1);
        let refines = format!("#{id}");
        xml.element("dc:contributor", &[("id", id.as_str())], &contributor.name)?;
        xml.element(
            "meta",
            &[("property", "role"), ("refines", refines.as_str()), ("scheme", "marc:relators")],
            contributor.role.marc_code(),
        )?;
    }
    if let Some(cover) = resources.iter().find(|r| r.cover) {
        xml.empty("meta", &[("name", "cover"), ("content", cover.id.as_str())])?;
    }
    xml.close("metadata")?;

    xml.open("manifest", &[])?;
    for resource in resources {
        let mut attributes = vec![("href", resource.href.as_str()), ("id", resource.id.as_str()), ("media-type", resource.media_type)];
        if resource.cover {
            attributes.push(("properties", "cover-image"));
        }
        xml.empty("item", &attributes)?;
    }
    for entry in entries {
        xml.empty("item", &[("href", entry.href.as_str()), ("id", entry.id.as_str()), ("media-type", XHTML)])?;
    }
    xml.empty("item", &[("href", TOC), ("id", TOC), ("media-type", XHTML), ("properties", "nav")])?;
    xml.empty("item", &[("href", NCX), ("id", NCX), ("media-type", "application/x-dtbncx+xml")])?;
    xml.close("manifest")?;

    xml.open("spine", &[("toc", NCX)])?;
    for entry in entries {
        xml.empty("itemref", &[("idref", entry.id.as_str())])?;
    }
    xml.close("spine")?;
    xml.close("package")?;
    xml.finish()
}

/// Hrefs of the spine's item references, resolved through the manifest.
pub(crate) fn reading_order(opf: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(opf);
    reader.trim_text(true);
    let mut manifest = HashMap::new();
    let mut idrefs = Vec::new();
    loop {
        match reader.read_event().or_raise(|| ErrorKind::Integrity(OPF.into()))? {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"item" => {
                    if let (Some(id), Some(href)) = (attribute(&e, "id")?, attribute(&e, "href")?) {
                        manifest.insert(id, href);
                    }
                },
                b"itemref" => idrefs.extend(attribute(&e, "idref")?),
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }
    idrefs
        .into_iter()
        .map(|idref| match manifest.get(&idref) {
            Some(href) => Ok(href.clone()),
            None => exn::bail!(ErrorKind::Integrity(format!("spine references unknown item {idref}"))),
        })
        .collect()
}

struct Field {
    name: String,
    id: Option<String>,
    property: Option<String>,
    text: String,
}

/// Dublin Core fields of a package document as a metadata patch.
///
/// Contributor roles come from their identifiers (`artist-1`). The colophon
/// pointer appended to the rights statement is stripped.
pub(crate) fn read_metadata(opf: &str) -> Result<MetadataPatch> {
    let invalid = || ErrorKind::Format(OPF.into());
    let mut reader = Reader::from_str(opf);
    reader.trim_text(true);
    let mut patch = MetadataPatch::default();
    let (mut creator, mut subject, mut contributor) = (Vec::new(), Vec::new(), Vec::new());
    let mut field = None;
    loop {
        match reader.read_event().or_raise(invalid)? {
            Event::Start(e) => {
                field = Some(Field {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    id: attribute(&e, "id")?,
                    property: attribute(&e, "property")?,
                    text: String::new(),
                });
            },
            Event::Text(text) => {
                if let Some(field) = field.as_mut() {
                    field.text.push_str(&text.unescape().or_raise(invalid)?);
                }
            },
            Event::End(_) => {
                let Some(Field { name, id, property, text }) = field.take() else {
                    continue;
                };
                match (name.as_str(), property.as_deref()) {
                    ("dc:identifier", _) => patch.identifier = Some(text),
                    ("dc:title", _) => patch.title = Some(text),
                    ("dc:language", _) => patch.language = Some(text),
                    ("dc:date", _) => patch.date = Some(text),
                    ("dc:publisher", _) => patch.publisher = Some(text),
                    ("dc:description", _) => patch.description = Some(text),
                    ("dc:rights", _) => {
                        patch.rights = Some(text.strip_suffix(COLOPHON_NOTE).unwrap_or(text.as_str()).trim_end().to_string());
                    },
                    ("dc:creator", _) => creator.push(text),
                    ("dc:subject", _) => subject.push(text),
                    ("dc:contributor", _) => {
                        let role = id.as_deref().and_then(|id| id.rsplit_once('-')).and_then(|(role, _)| role.parse::<Role>().ok());
                        match role {
                            Some(role) => contributor.push(Contributor::new(role, text, "")),
                            None => tracing::debug!(?id, "contributor without a known role skipped"),
                        }
                    },
                    ("meta", Some("se:long-description")) => patch.long_description = Some(text),
                    _ => {},
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }
    patch.creator = (!creator.is_empty()).then_some(creator);
    patch.subject = (!subject.is_empty()).then_some(subject);
    patch.contributor = (!contributor.is_empty()).then_some(contributor);
    Ok(patch)
}

/// Points the manifest item for `href` at `replacement`.
///
/// Returns the rewritten document and the item's new identifier. A cover
/// `meta` naming the old identifier follows it. Everything else passes
/// through unchanged.
pub(crate) fn replace_item(opf: &str, href: &str, replacement: &str, media_type: &str) -> Result<(String, String)> {
    let invalid = || ErrorKind::Format(OPF.into());
    let mut taken = HashSet::new();
    let mut previous = None;
    let mut reader = Reader::from_str(opf);
    loop {
        match reader.read_event().or_raise(invalid)? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"item" => {
                let id = attribute(&e, "id")?;
                match attribute(&e, "href")?.as_deref() == Some(href) {
                    true => previous = id,
                    false => taken.extend(id),
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }
    let Some(previous) = previous else {
        exn::bail!(ErrorKind::NotFound(format!("manifest item {href}")));
    };
    let retarget = Retarget { href, replacement, media_type, id: unique_id(item_id(replacement), &mut taken), previous };

    let mut reader = Reader::from_str(opf);
    let mut writer = Writer::new(Vec::new());
    loop {
        let event = match reader.read_event().or_raise(invalid)? {
            Event::Eof => break,
            Event::Start(e) => Event::Start(retarget.apply(e)?),
            Event::Empty(e) => Event::Empty(retarget.apply(e)?),
            event => event,
        };
        writer.write_event(event).or_raise(|| ErrorKind::Io)?;
    }
    let opf = String::from_utf8(writer.into_inner()).or_raise(|| ErrorKind::Io)?;
    Ok((opf, retarget.id))
}

struct Retarget<'r> {
    href: &'r str,
    replacement: &'r str,
    media_type: &'r str,
    previous: String,
    id: String,
}

impl Retarget<'_> {
    fn apply<'a>(&self, element: BytesStart<'a>) -> Result<BytesStart<'a>> {
        let name = element.name();
        let item = name.as_ref() == b"item" && attribute(&element, "href")?.as_deref() == Some(self.href);
        let cover = name.as_ref() == b"meta"
            && attribute(&element, "name")?.as_deref() == Some("cover")
            && attribute(&element, "content")?.as_deref() == Some(self.previous.as_str());
        if !item && !cover {
            return Ok(element);
        }
        let mut rewritten = BytesStart::new(String::from_utf8_lossy(name.as_ref()).into_owned());
        for attr in element.attributes() {
            let attr = attr.or_raise(|| ErrorKind::Format(OPF.into()))?;
            match (item, attr.key.as_ref()) {
                (true, b"href") => rewritten.push_attribute(("href", self.replacement)),
                (true, b"id") => rewritten.push_attribute(("id", self.id.as_str())),
                (true, b"media-type") => rewritten.push_attribute(("media-type", self.media_type)),
                (false, b"content") => rewritten.push_attribute(("content", self.id.as_str())),
                _ => rewritten.push_attribute(attr),
            }
        }
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{metadata, spine};
    use super::super::{Resource, reading_order as entries};
    use super::*;
    use bindery_model::{Contributor, MetadataPatch, Role};
    use time::macros::datetime;

    fn opf(metadata: &WorkMetadata, resources: &[Resource], dedication: bool, chapters: &[&str]) -> String {
        write(metadata, resources, &entries(&spine(dedication, chapters)), datetime!(2024-01-02 03:04:05.678 +01:00)).unwrap()
    }

    #[test]
    fn required_metadata() {
        let xml = opf(&metadata(), &[], false, &["One"]);
        assert!(xml.contains("<dc:identifier id=\"uid\">urn:uuid:0b3e1d5c-5f7a-4a64-9c1b-1f0e7d2a9c11</dc:identifier>"));
        assert!(xml.contains("<dc:date>2021-07-16T00:00:00Z</dc:date>"));
        assert!(xml.contains("<meta property=\"dcterms:modified\">2024-01-02T02:04:05Z</meta>"));
        assert!(xml.contains("<dc:rights>All rights reserved. For full license information"));
        assert!(xml.contains("<dc:title id=\"title\">T</dc:title>"));
        assert!(xml.contains("<dc:language>en</dc:language>"));
        assert!(xml.contains("<dc:creator id=\"author-1\">A</dc:creator>"));
        assert!(!xml.contains("dc:publisher"));
        assert!(!xml.contains("se:word-count"));
        assert!(!xml.contains("name=\"cover\""));
    }

    #[test]
    fn repeatable_fields_in_input_order() {
        let mut metadata = metadata();
        metadata
            .apply(MetadataPatch {
                creator: Some(vec!["Ann".into(), "Bob".into()]),
                subject: Some(vec!["Fiction".into(), "Africa".into()]),
                contributor: Some(vec![
                    Contributor::new(Role::Artist, "Rodd", ""),
                    Contributor::new(Role::Translator, "Tess", ""),
                ]),
                publisher: Some("Qwyre".into()),
                ..Default::default()
            })
            .unwrap();
        metadata.word_count = Some(150);
        let xml = opf(&metadata, &[], false, &[]);
        let ann = xml.find("<dc:creator id=\"author-1\">Ann</dc:creator>").unwrap();
        let bob = xml.find("<dc:creator id=\"author-2\">Bob</dc:creator>").unwrap();
        assert!(ann < bob);
        assert!(xml.contains("<dc:subject id=\"subject-1\">Fiction</dc:subject>"));
        assert!(xml.contains("<dc:subject id=\"subject-2\">Africa</dc:subject>"));
        assert!(xml.contains("<dc:contributor id=\"artist-1\">Rodd</dc:contributor>"));
        assert!(xml.contains("<meta property=\"role\" refines=\"#translator-2\" scheme=\"marc:relators\">trl</meta>"));
        assert!(xml.contains("<meta property=\"file-as\" refines=\"#publisher\">Qwyre</meta>"));
        assert!(xml.contains("<meta property=\"se:word-count\">150</meta>"));
    }

    #[test]
    fn cover_is_flagged() {
        let resources = vec![
            Resource { id: "cover.jpg".into(), href: "images/cover.jpg".into(), media_type: "image/jpeg", cover: true },
            Resource { id: "core.css".into(), href: "css/core.css".into(), media_type: "text/css", cover: false },
        ];
        let xml = opf(&metadata(), &resources, false, &["One"]);
        assert!(xml.contains(
            "<item href=\"images/cover.jpg\" id=\"cover.jpg\" media-type=\"image/jpeg\" properties=\"cover-image\"/>"
        ));
        assert!(xml.contains("<item href=\"css/core.css\" id=\"core.css\" media-type=\"text/css\"/>"));
        assert!(xml.contains("<meta name=\"cover\" content=\"cover.jpg\"/>"));
    }

    #[test]
    fn spine_order() {
        let xml = opf(&metadata(), &[], true, &["One", "Two"]);
        assert!(xml.contains("<spine toc=\"toc.ncx\">"));
        assert!(xml.contains("properties=\"nav\""));
        assert_eq!(
            reading_order(&xml).unwrap(),
            vec![
                "text/titlepage.xhtml",
                "text/dedication.xhtml",
                "text/chapter-1.xhtml",
                "text/chapter-2.xhtml",
                "text/colophon.xhtml",
            ]
        );
    }

    #[test]
    fn metadata_reads_back() {
        let mut metadata = metadata();
        metadata
            .apply(MetadataPatch {
                creator: Some(vec!["Ann".into(), "Bob".into()]),
                subject: Some(vec!["Fiction".into()]),
                contributor: Some(vec![Contributor::new(Role::Translator, "Tess", "")]),
                publisher: Some("Qwyre & Co".into()),
                description: Some("Short.".into()),
                long_description: Some("Long.".into()),
                ..Default::default()
            })
            .unwrap();
        let patch = read_metadata(&opf(&metadata, &[], false, &["One"])).unwrap();
        assert_eq!(patch.identifier.as_deref(), Some("urn:uuid:0b3e1d5c-5f7a-4a64-9c1b-1f0e7d2a9c11"));
        assert_eq!(patch.title.as_deref(), Some("T"));
        assert_eq!(patch.creator, Some(vec!["Ann".to_string(), "Bob".to_string()]));
        assert_eq!(patch.rights.as_deref(), Some("All rights reserved."));
        assert_eq!(patch.publisher.as_deref(), Some("Qwyre & Co"));
        assert_eq!(patch.long_description.as_deref(), Some("Long."));
        assert_eq!(patch.contributor, Some(vec![Contributor::new(Role::Translator, "Tess", "")]));

        let read = WorkMetadata::try_from(patch).unwrap();
        assert_eq!(read.date, metadata.date);
        assert_eq!(read.subject, metadata.subject);
        assert_eq!(read.description, metadata.description);
    }

    #[test]
    fn replaced_item_and_cover_meta() {
        let resources = vec![
            Resource { id: "cover.jpg".into(), href: "images/cover.jpg".into(), media_type: "image/jpeg", cover: true },
            Resource { id: "cover.png".into(), href: "images/old/cover.png".into(), media_type: "image/png", cover: false },
        ];
        let xml = opf(&metadata(), &resources, false, &["One"]);
        let (xml, id) = replace_item(&xml, "images/cover.jpg", "images/cover.png", "image/png").unwrap();
        assert_eq!(id, "cover.png-2");
        assert!(xml.contains(
            "<item href=\"images/cover.png\" id=\"cover.png-2\" media-type=\"image/png\" properties=\"cover-image\"/>"
        ));
        assert!(xml.contains("<meta name=\"cover\" content=\"cover.png-2\"/>"));
        assert!(!xml.contains("cover.jpg"));
        assert_eq!(reading_order(&xml).unwrap().len(), 3);
    }

    #[test]
    fn replacing_unknown_item() {
        let xml = opf(&metadata(), &[], false, &["One"]);
        let err = replace_item(&xml, "images/missing.png", "images/new.png", "image/png").unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn unknown_idref() {
        let xml = r#"<package><manifest/><spine><itemref idref="missing"/></spine></package>"#;
        let err = reading_order(xml).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Integrity(_)));
    }
}
