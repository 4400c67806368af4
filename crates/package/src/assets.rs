//! The stylesheet and images every package carries.
//!
//! Compiled into the binary with [`rust-embed`](rust_embed). Paths are
//! relative to the package root, so `css/core.css` lands at
//! `<root>/css/core.css`.

use std::borrow::Cow;

use exn::OptionExt;
use rust_embed::Embed;

use crate::BuildOptions;
use crate::error::{ErrorKind, Result};

#[derive(Embed)]
#[folder = "../../assets/static/"]
pub struct Builtins;

impl Builtins {
    /// Bytes of one bundled file.
    pub fn load(path: impl AsRef<str>) -> Result<Cow<'static, [u8]>> {
        let path = path.as_ref();
        Self::get(path).map(|f| f.data).ok_or_raise(|| ErrorKind::NotFound(format!("bundled {path}")))
    }

    /// Every bundled file with its container path under the package root.
    pub fn entries(options: &BuildOptions) -> impl Iterator<Item = (String, Cow<'static, [u8]>)> + '_ {
        Self::iter().filter_map(move |path| Some((options.entry(&path), Self::get(&path)?.data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_core_style() {
        let css = Builtins::load("css/core.css").unwrap();
        assert!(!css.is_empty());
    }

    #[test]
    fn entries_land_under_the_root() {
        let options = BuildOptions { root: "OEBPS".into(), ..Default::default() };
        let paths: Vec<_> = Builtins::entries(&options).map(|(path, _)| path).collect();
        assert!(paths.contains(&"OEBPS/css/core.css".to_string()));
        assert!(paths.contains(&"OEBPS/images/logo.svg".to_string()));
    }

    #[test]
    fn missing_file() {
        let err = Builtins::load("fonts/missing.otf").unwrap_err();
        assert_eq!(*err, ErrorKind::NotFound("bundled fonts/missing.otf".to_string()));
    }
}
