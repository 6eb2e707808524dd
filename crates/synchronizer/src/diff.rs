//! Set difference between two snapshots.

use std::collections::HashSet;
use std::hash::Hash;

/// Items only on one side. Input order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff<T> {
    /// In `remote` but not in `local`: new or changed.
    pub added: Vec<T>,
    /// In `local` but not in `remote`: gone or stale.
    pub removed: Vec<T>,
}

impl<T> Diff<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare two snapshots by full value. Callers canonicalize
/// order-insensitive fields first.
pub fn diff<T: Eq + Hash + Clone>(remote: &[T], local: &[T]) -> Diff<T> {
    let remote_set: HashSet<&T> = remote.iter().collect();
    let local_set: HashSet<&T> = local.iter().collect();

    Diff {
        added: remote.iter().filter(|t| !local_set.contains(t)).cloned().collect(),
        removed: local.iter().filter(|t| !remote_set.contains(t)).cloned().collect(),
    }
}
