//! LMDB-backed [`MetaStore`].

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RwTxn};

use ledgerline_store::{MetaStore, StoreError};

use crate::LmdbError;

pub struct LmdbMetaStore {
    pub(crate) env: Arc<Env>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbMetaStore {
    /// Run `f` in a write transaction and commit it.
    fn write<F>(&self, f: F) -> Result<(), LmdbError>
    where
        F: FnOnce(&mut RwTxn<'_>, Database<Bytes, Bytes>) -> Result<(), heed::Error>,
    {
        let mut wtxn = self.env.write_txn()?;
        f(&mut wtxn, self.meta_db)?;
        wtxn.commit()?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.meta_db.get(&rtxn, key.as_bytes())?.map(<[u8]>::to_vec))
    }
}

impl MetaStore for LmdbMetaStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.write(|wtxn, db| db.put(wtxn, key.as_bytes(), value))?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.read(key)?)
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.write(|wtxn, db| db.delete(wtxn, key.as_bytes()).map(|_| ()))?;
        Ok(())
    }
}
