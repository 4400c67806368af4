//! In-memory overlay of staged archive operations.

use std::collections::HashMap;

/// A staged operation against a single archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// Replace (or create) the entry with these bytes.
    Write(Vec<u8>),
    /// Remove the entry.
    Delete,
}

/// Pending writes and deletes keyed by archive-internal path.
///
/// Entries are consumed one at a time with [`take`](Self::take) while the
/// archive is rebuilt; whatever is left afterwards refers to paths that did
/// not exist in the source archive, and is handed back in staging order by
/// [`drain_remaining`](Self::drain_remaining).
#[derive(Debug, Default)]
pub(crate) struct Overlay {
    pending: HashMap<String, Pending>,
    // First-staged order, so that appended entries land deterministically.
    order: Vec<String>,
}
impl Overlay {
    /// Stages a write, returning whatever was previously staged for the path.
    pub(crate) fn write(&mut self, path: String, data: Vec<u8>) -> Option<Pending> {
        self.stage(path, Pending::Write(data))
    }

    /// Stages a delete, returning (and releasing) whatever was previously staged.
    pub(crate) fn delete(&mut self, path: String) -> Option<Pending> {
        self.stage(path, Pending::Delete)
    }

    fn stage(&mut self, path: String, operation: Pending) -> Option<Pending> {
        if !self.pending.contains_key(&path) {
            self.order.push(path.clone());
        }
        self.pending.insert(path, operation)
    }

    pub(crate) fn get(&self, path: &str) -> Option<&Pending> {
        self.pending.get(path)
    }

    /// Consumes the staged operation for a path.
    pub(crate) fn take(&mut self, path: &str) -> Option<Pending> {
        self.pending.remove(path)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total size of all staged write buffers.
    pub(crate) fn staged_bytes(&self) -> usize {
        self.pending
            .values()
            .map(|op| match op {
                Pending::Write(data) => data.len(),
                Pending::Delete => 0,
            })
            .sum()
    }

    /// Paths staged for writing that are not yet consumed, in staging order.
    pub(crate) fn staged_writes(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter(|path| matches!(self.pending.get(path.as_str()), Some(Pending::Write(_))))
            .map(String::as_str)
    }

    /// Removes and returns every unconsumed operation, in staging order.
    pub(crate) fn drain_remaining(&mut self) -> Vec<(String, Pending)> {
        let order = std::mem::take(&mut self.order);
        order.into_iter().filter_map(|path| self.pending.remove(&path).map(|op| (path, op))).collect()
    }

    /// Releases every staged buffer, returning how many operations were dropped.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        self.pending.shrink_to_fit();
        self.order.clear();
        self.order.shrink_to_fit();
        count
    }
}
