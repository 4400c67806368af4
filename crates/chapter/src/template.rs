//! Page templates bundled into the binary.
//!
//! Templates use [upon] syntax. Values are written verbatim unless passed
//! through a formatter, so every template pipes plain text through `xml`:
//!
//! - **`xml`**: escapes a string for use in XML text or attribute values.
//! - **`upper`**: upper-cases a string, then escapes it.
//! - **`host`**: reduces a URI to its host name, then escapes it.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use rust_embed::Embed;
use std::borrow::Cow;
use upon::{Engine, Template};

#[derive(Embed)]
#[folder = "../../assets/templates/"]
pub struct Templates;
impl Templates {
    /// Get the source of a bundled template by name.
    pub fn load(name: impl AsRef<str>) -> Result<String> {
        let name = name.as_ref();
        let file = Self::get(name).ok_or_raise(|| ErrorKind::Template(name.to_string()))?;
        String::from_utf8(file.data.into_owned()).or_raise(|| ErrorKind::Template(name.to_string()))
    }

    /// List all bundled template names.
    pub fn list() -> Vec<Cow<'static, str>> {
        Self::iter().collect()
    }

    pub fn exists(name: impl AsRef<str>) -> bool {
        Self::get(name.as_ref()).is_some()
    }
}

/// Creates a template engine with the XML formatters registered.
pub fn engine() -> Engine<'static> {
    let mut engine = Engine::new();
    addons::configure(&mut engine);
    engine
}

/// Compiles a bundled template, failing fast on syntax errors.
pub fn compile(engine: &Engine<'static>, name: &str) -> Result<Template<'static>> {
    let source = Templates::load(name)?;
    engine.compile(source).or_raise(|| ErrorKind::Template(name.to_string()))
}

mod addons {
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    fn xml_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "{}", quick_xml::escape::escape(s.as_str()))?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    fn upper_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "{}", quick_xml::escape::escape(s.to_uppercase().as_str()))?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    /// `https://example.com:8080/path?q` becomes `example.com:8080`.
    fn host_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => {
                let rest = s.split_once("://").map_or(s.as_str(), |(_, rest)| rest);
                let host = rest.split(['/', '?', '#']).next().unwrap_or(rest);
                write!(f, "{}", quick_xml::escape::escape(host))?
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("xml", xml_formatter);
        engine.add_formatter("upper", upper_formatter);
        engine.add_formatter("host", host_formatter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn chapter_template_is_bundled() {
        assert!(Templates::exists("chapter.xhtml"));
        assert!(Templates::list().iter().any(|t| t == "chapter.xhtml"));
        assert!(Templates::load("missing.xhtml").is_err());
    }

    #[rstest]
    #[case("{{ v | xml }}", "Fish & <Chips>", "Fish &amp; &lt;Chips&gt;")]
    #[case("{{ v | upper }}", "Usan Abasi's Lament", "USAN ABASI&apos;S LAMENT")]
    #[case("{{ v | host }}", "https://gavinchait.com/books?x=1", "gavinchait.com")]
    #[case("{{ v | host }}", "gavinchait.com", "gavinchait.com")]
    #[case("{{ v }}", "<p>raw</p>", "<p>raw</p>")]
    fn formatters(#[case] source: &str, #[case] value: &str, #[case] expected: &str) {
        let engine = engine();
        let template = engine.compile(source.to_string()).unwrap();
        let output = template.render(&engine, upon::value! { v: value }).to_string().unwrap();
        assert_eq!(output, expected);
    }
}
