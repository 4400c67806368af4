use super::{Matter, MatterPartition};
use crate::error::{ErrorKind, Result};

/// Caller-ordered reading content: an optional dedication followed by body
/// matter.
///
/// Title page and colophon are structural bookends and never appear here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spine {
    entries: Vec<Matter>,
}

impl Spine {
    /// Validates the ordering rules: at most one dedication, only at
    /// position 0, and body matter everywhere else.
    pub fn new(entries: Vec<Matter>) -> Result<Self> {
        for (index, matter) in entries.iter().enumerate() {
            match (index, matter) {
                (0, m) if m.is_dedication() => {},
                (_, m) if m.is_dedication() => {
                    exn::bail!(ErrorKind::InvalidMatter(format!("dedication at position {index}")))
                },
                (_, m) if m.partition() != MatterPartition::Body => {
                    exn::bail!(ErrorKind::InvalidMatter(format!("{} at position {index}", m.title())))
                },
                _ => {},
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[Matter] {
        &self.entries
    }

    pub fn dedication(&self) -> Option<&Matter> {
        self.entries.first().filter(|m| m.is_dedication())
    }

    /// Body entries paired with their 1-based chapter number.
    pub fn chapters(&self) -> impl Iterator<Item = (usize, &Matter)> {
        let skip = usize::from(self.dedication().is_some());
        self.entries.iter().skip(skip).enumerate().map(|(i, m)| (i + 1, m))
    }

    pub fn chapter_count(&self) -> usize {
        self.entries.len() - usize::from(self.dedication().is_some())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
