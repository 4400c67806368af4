use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

selector!(SECTION_SELECTOR, "section");
selector!(BODY_SELECTOR, "body");
selector!(HEADING_SELECTOR, "h1");
selector!(TITLE_SELECTOR, "head title");

/// Elements that never have content and must self-close in XHTML.
pub(crate) const VOID_ELEMENTS: [&str; 13] =
    ["area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr"];

/// Attributes holding references that may point into the converter's asset folder.
pub(crate) const REFERENCE_ATTRIBUTES: [&str; 3] = ["src", "href", "poster"];

pub(crate) const DEFAULT_MEDIA_DIR: &str = "media";
pub(crate) const IMAGES_DIR: &str = "images";
