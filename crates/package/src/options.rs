//! Container conventions for a build.

use bindery_archive::Compression;
use exn::ResultExt;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Result};

/// Environment variable prefix for [`BuildOptions::from_env`].
pub const ENV_PREFIX: &str = "BINDERY_";

/// Paths and naming conventions used when assembling a package.
///
/// ```
/// use bindery_package::BuildOptions;
/// let options = BuildOptions::default();
/// assert_eq!(options.entry("content.opf"), "EPUB/content.opf");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Package root directory inside the container.
    pub root: String,
    /// File-name prefix of the converter's chapter fragments.
    pub chapter_prefix: String,
    /// Converter asset directory, moved to `images` during a build.
    pub media_dir: String,
    /// Converter leftovers to delete, relative to `root`. Missing entries are ignored.
    pub removals: Vec<String>,
    /// Compression for entries added to the container.
    pub compression: Compression,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            root: "EPUB".to_string(),
            chapter_prefix: "ch".to_string(),
            media_dir: "media".to_string(),
            removals: vec![
                "styles/stylesheet1.css".to_string(),
                "text/title_page.xhtml".to_string(),
                "nav.xhtml".to_string(),
            ],
            compression: Compression::Deflated,
        }
    }
}

impl BuildOptions {
    /// Defaults overlaid with `BINDERY_`-prefixed environment variables.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn from_env() -> Result<Self> {
        Self::figment().extract().or_raise(|| ErrorKind::Config)
    }

    /// Full container path of an entry below the package root.
    pub fn entry(&self, relative: impl AsRef<str>) -> String {
        format!("{}/{}", self.root.trim_matches('/'), relative.as_ref().trim_start_matches('/'))
    }

    /// Container prefix (with trailing slash) of a directory below the package root.
    pub(crate) fn directory(&self, relative: impl AsRef<str>) -> String {
        format!("{}/", self.entry(relative.as_ref().trim_matches('/')))
    }
}
