//! LMDB implementation of KvStore.

use std::ops::Bound;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use ledgerline_store::{increment_prefix, BatchOp, KvStore, StoreError, UpdateBatch};

use crate::LmdbError;

/// One LMDB database exposed as an ordered key-value store.
#[derive(Clone)]
pub struct LmdbKvStore {
    env: Arc<Env>,
    db: Database<Bytes, Bytes>,
    no_sync: bool,
}

impl LmdbKvStore {
    pub(crate) fn new(env: Arc<Env>, db: Database<Bytes, Bytes>, no_sync: bool) -> Self {
        Self { env, db, no_sync }
    }

    /// Number of entries in the database.
    pub fn len(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.db.len(&rtxn).map_err(LmdbError::from)?)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl KvStore for LmdbKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let value = self.db.get(&rtxn, key).map_err(LmdbError::from)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn write_batch(&self, batch: UpdateBatch, sync: bool) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        for (key, op) in batch {
            match op {
                BatchOp::Put(value) => {
                    self.db
                        .put(&mut wtxn, &key, &value)
                        .map_err(LmdbError::from)?;
                }
                BatchOp::Delete => {
                    self.db.delete(&mut wtxn, &key).map_err(LmdbError::from)?;
                }
            }
        }
        wtxn.commit().map_err(LmdbError::from)?;

        // Commits already fsync unless the environment was opened NO_SYNC.
        if sync && self.no_sync {
            self.env.force_sync().map_err(LmdbError::from)?;
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut upper = prefix.to_vec();
        let upper_bound = if increment_prefix(&mut upper) {
            Bound::Excluded(upper.as_slice())
        } else {
            Bound::Unbounded
        };
        let bounds = (Bound::Included(prefix), upper_bound);

        let iter = self.db.range(&rtxn, &bounds).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for entry in iter {
            let (key, value) = entry.map_err(LmdbError::from)?;
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }
}
