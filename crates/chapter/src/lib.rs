//! Chapter handling for converter-produced fragments.
//!
//! [`Normalizer`] reshapes a fragment into the canonical chapter template as
//! well-formed XHTML and extracts its display title; [`count`] gives a
//! deterministic word count. The bundled [`template`] engine is shared with
//! the other generated pages.

mod consts;
mod count;
pub mod error;
mod normalize;
pub mod template;
pub mod xhtml;

pub use self::count::count;
pub use self::normalize::{Chapter, Normalizer};

use crate::error::Result;

/// Normalizes a fragment using the default converter asset folder (`media`).
pub fn normalize(source: &[u8]) -> Result<Option<Chapter>> {
    Normalizer::new(consts::DEFAULT_MEDIA_DIR)?.normalize(source)
}
