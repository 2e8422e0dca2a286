//! Ordered byte-key store trait.

use std::sync::Arc;

use crate::{StoreError, UpdateBatch};

/// An ordered key-value store with atomic batch writes.
///
/// Keys compare lexicographically as bytes, so big-endian numeric
/// components sort numerically.
pub trait KvStore: Send + Sync {
    /// Retrieve the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Apply every operation in `batch` atomically.
    ///
    /// With `sync` set the write is durable when this returns.
    fn write_batch(&self, batch: UpdateBatch, sync: bool) -> Result<(), StoreError>;

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    /// Store a single value.
    fn put(&self, key: &[u8], value: &[u8], sync: bool) -> Result<(), StoreError> {
        let mut batch = UpdateBatch::new();
        batch.put(key, value);
        self.write_batch(batch, sync)
    }
}

impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn write_batch(&self, batch: UpdateBatch, sync: bool) -> Result<(), StoreError> {
        (**self).write_batch(batch, sync)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        (**self).scan_prefix(prefix)
    }
}

/// Turn `prefix` into the smallest key greater than every key it prefixes.
///
/// Returns `false` when no such key exists (empty or all-`0xFF` prefix), in
/// which case the scan must run to the end of the keyspace.
pub fn increment_prefix(prefix: &mut Vec<u8>) -> bool {
    while let Some(last) = prefix.pop() {
        if last < 0xFF {
            prefix.push(last + 1);
            return true;
        }
    }
    false
}
