//! Data model for a publication: Dublin Core metadata, contributors and the
//! partitioned "matter" entries that make up the reading order.

pub mod error;
mod contributor;
mod matter;
mod metadata;
mod spine;

pub use self::contributor::{Contributor, Role};
pub use self::matter::{BackMatter, BodyMatter, FrontMatter, Matter, MatterPartition};
pub use self::metadata::{MetadataPatch, WorkMetadata};
pub use self::spine::Spine;

/// Normalizes a vocabulary term for lenient matching.
fn sanitize(s: impl AsRef<str>) -> String {
    s.as_ref().trim().to_lowercase().replace(['-', '_', ' '], "")
}
