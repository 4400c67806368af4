//! Serialization of parsed HTML back into well-formed XHTML.

use std::borrow::Cow;

use quick_xml::escape::escape;
use scraper::{ElementRef, Node};

use crate::consts::{IMAGES_DIR, REFERENCE_ATTRIBUTES, VOID_ELEMENTS};

/// Rewrites relative references from the converter's asset folder to the
/// canonical image folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRewrite {
    from: String,
    to: String,
}
impl AssetRewrite {
    pub fn new(media_dir: impl AsRef<str>) -> Self {
        Self { from: format!("../{}/", media_dir.as_ref().trim_matches('/')), to: format!("../{IMAGES_DIR}/") }
    }

    pub fn apply<'v>(&self, value: &'v str) -> Cow<'v, str> {
        match value.strip_prefix(self.from.as_str()) {
            Some(rest) => Cow::Owned(format!("{}{rest}", self.to)),
            None => Cow::Borrowed(value),
        }
    }
}

/// Serializes the children of `element` as XHTML.
///
/// Void elements self-close, text and attribute values are escaped, and
/// comments, doctypes and processing instructions are dropped.
pub fn inner(element: ElementRef<'_>, rewrite: Option<&AssetRewrite>) -> String {
    let mut out = String::new();
    write_children(&mut out, element, rewrite);
    out
}

/// Serializes `element` itself, including its start and end tags.
pub fn outer(element: ElementRef<'_>, rewrite: Option<&AssetRewrite>) -> String {
    let mut out = String::new();
    write_element(&mut out, element, rewrite);
    out
}

fn write_children(out: &mut String, element: ElementRef<'_>, rewrite: Option<&AssetRewrite>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape(&**text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(out, child, rewrite);
                }
            },
            _ => {},
        }
    }
}

fn write_element(out: &mut String, element: ElementRef<'_>, rewrite: Option<&AssetRewrite>) {
    let name = element.value().name();
    out.push('<');
    out.push_str(name);
    for (attribute, value) in element.value().attrs() {
        let value = match rewrite {
            Some(rewrite) if REFERENCE_ATTRIBUTES.contains(&attribute) => rewrite.apply(value),
            _ => Cow::Borrowed(value),
        };
        out.push(' ');
        out.push_str(attribute);
        out.push_str("=\"");
        out.push_str(&escape(value.as_ref()));
        out.push('"');
    }
    if VOID_ELEMENTS.contains(&name) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    write_children(out, element, rewrite);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::BODY_SELECTOR;
    use rstest::rstest;
    use scraper::Html;

    fn body(source: &str) -> String {
        let document = Html::parse_document(source);
        let body = document.select(&BODY_SELECTOR).next().unwrap();
        inner(body, Some(&AssetRewrite::new("media")))
    }

    #[rstest]
    #[case("<p>one<br>two</p>", "<p>one<br/>two</p>")]
    #[case("<hr><p>a</p>", "<hr/><p>a</p>")]
    #[case("<p>Fish &amp; Chips &lt;3</p>", "<p>Fish &amp; Chips &lt;3</p>")]
    #[case("<p><!-- note -->kept</p>", "<p>kept</p>")]
    #[case("<p class='a\"b'>x</p>", "<p class=\"a&quot;b\">x</p>")]
    #[case("<img src=\"../media/rId9.png\">", "<img src=\"../images/rId9.png\"/>")]
    #[case("<a href=\"../media/notes.pdf\">n</a>", "<a href=\"../images/notes.pdf\">n</a>")]
    #[case("<a href=\"https://example.com/media/x\">n</a>", "<a href=\"https://example.com/media/x\">n</a>")]
    fn serializes_xhtml(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(body(source), expected);
    }

    #[test]
    fn outer_keeps_element_tags() {
        let document = Html::parse_document("<section class=\"footnotes\"><img src=\"../media/a.png\"></section>");
        let section = document.select(&crate::consts::SECTION_SELECTOR).next().unwrap();
        assert_eq!(
            outer(section, Some(&AssetRewrite::new("media"))),
            "<section class=\"footnotes\"><img src=\"../images/a.png\"/></section>"
        );
    }

    #[test]
    fn rewrite_custom_media_dir() {
        let rewrite = AssetRewrite::new("/assets/");
        assert_eq!(rewrite.apply("../assets/a.jpg"), "../images/a.jpg");
        assert_eq!(rewrite.apply("../media/a.jpg"), "../media/a.jpg");
    }

    #[test]
    fn no_rewrite_without_rule() {
        let document = Html::parse_document("<img src=\"../media/a.png\">");
        let body = document.select(&BODY_SELECTOR).next().unwrap();
        assert_eq!(inner(body, None), "<img src=\"../media/a.png\"/>");
    }
}
