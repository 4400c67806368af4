use scraper::{ElementRef, Html, Node};

use crate::consts::BODY_SELECTOR;

/// Counts the words in a chapter.
///
/// Only text nodes of the body are considered, so tag names and attribute
/// values never count. Text nodes are joined without a separator before
/// splitting on whitespace. Top-level headings are the chapter's title and
/// are skipped.
pub fn count(markup: &str) -> u64 {
    let document = Html::parse_document(markup);
    let root = document.select(&BODY_SELECTOR).next().unwrap_or_else(|| document.root_element());
    let mut text = String::new();
    collect_text(root, &mut text);
    text.split_whitespace().count() as u64
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if matches!(e.name(), "h1" | "script" | "style") => {},
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            },
            _ => {},
        }
    }
}
