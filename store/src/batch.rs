//! Update batches: a set of puts and deletes applied atomically.

use std::collections::BTreeMap;

/// A single pending mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>),
    Delete,
}

/// An ordered set of mutations applied in one atomic write.
///
/// A later operation on the same key replaces an earlier one, so a batch
/// never holds two operations for one key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    ops: BTreeMap<Vec<u8>, BatchOp>,
}

impl UpdateBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.insert(key.into(), BatchOp::Put(value.into()));
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.insert(key.into(), BatchOp::Delete);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Look up the pending operation for a key.
    pub fn get(&self, key: &[u8]) -> Option<&BatchOp> {
        self.ops.get(key)
    }

    /// Iterate over operations in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &BatchOp)> {
        self.ops.iter().map(|(k, op)| (k.as_slice(), op))
    }
}

impl IntoIterator for UpdateBatch {
    type Item = (Vec<u8>, BatchOp);
    type IntoIter = std::collections::btree_map::IntoIter<Vec<u8>, BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}
