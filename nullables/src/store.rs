//! Nullable stores: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use ledgerline_store::{increment_prefix, BatchOp, KvStore, MetaStore, StoreError, UpdateBatch};

/// An in-memory ordered key-value store.
///
/// Writes can be made to fail on demand, and every write records whether
/// durability was requested, so tests can assert on both.
pub struct NullKvStore {
    entries: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
    fail_all_writes: AtomicBool,
    failures_remaining: AtomicUsize,
    writes: AtomicUsize,
    sync_writes: AtomicUsize,
}

impl NullKvStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            fail_all_writes: AtomicBool::new(false),
            failures_remaining: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            sync_writes: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent write fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_all_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` writes fail, then succeed again.
    pub fn fail_next_writes(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Number of successful batch writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of successful batch writes that requested durability.
    pub fn sync_write_count(&self) -> usize {
        self.sync_writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored keys in ascending order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    fn take_injected_failure(&self) -> bool {
        if self.fail_all_writes.load(Ordering::SeqCst) {
            return true;
        }
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for NullKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for NullKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn write_batch(&self, batch: UpdateBatch, sync: bool) -> Result<(), StoreError> {
        if self.take_injected_failure() {
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        let mut entries = self.entries.lock().unwrap();
        for (key, op) in batch {
            match op {
                BatchOp::Put(value) => {
                    entries.insert(key, value);
                }
                BatchOp::Delete => {
                    entries.remove(&key);
                }
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        if sync {
            self.sync_writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut upper = prefix.to_vec();
        let upper_bound = if increment_prefix(&mut upper) {
            Bound::Excluded(upper)
        } else {
            Bound::Unbounded
        };
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .range((Bound::Included(prefix.to_vec()), upper_bound))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// An in-memory metadata store.
#[derive(Default)]
pub struct NullMetaStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl NullMetaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetaStore for NullMetaStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
