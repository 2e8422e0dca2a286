//! LMDB environment setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvFlags, EnvOpenOptions};

use crate::integrity::{check_data_dir, check_integrity, IntegrityReport};
use crate::kv::LmdbKvStore;
use crate::meta::LmdbMetaStore;
use crate::migration::Migrator;
use crate::LmdbError;

/// Names of the databases created in every environment.
pub(crate) const BLOCKS_DB: &str = "blocks";
pub(crate) const HISTORY_DB: &str = "history";
pub(crate) const META_DB: &str = "meta";

/// Tuning knobs for opening an environment.
#[derive(Clone, Debug)]
pub struct LmdbOptions {
    pub max_dbs: u32,
    pub map_size: usize,
    /// Skip the fsync on every commit. Writes that ask for durability then
    /// force an explicit sync.
    pub no_sync: bool,
}

impl Default for LmdbOptions {
    fn default() -> Self {
        Self {
            max_dbs: 8,
            map_size: 1024 * 1024 * 1024,
            no_sync: false,
        }
    }
}

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    path: PathBuf,
    no_sync: bool,
    pub(crate) blocks_db: Database<Bytes, Bytes>,
    pub(crate) history_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        Self::open_with(
            path,
            &LmdbOptions {
                max_dbs,
                map_size,
                no_sync: false,
            },
        )
    }

    /// Open or create an environment, create its databases and bring the
    /// schema up to date.
    pub fn open_with(path: &Path, options: &LmdbOptions) -> Result<Self, LmdbError> {
        check_data_dir(path)?;
        std::fs::create_dir_all(path)?;

        let mut open_options = EnvOpenOptions::new();
        open_options.map_size(options.map_size).max_dbs(options.max_dbs);
        if options.no_sync {
            // SAFETY: NO_SYNC only relaxes durability; every sync-requested
            // write is followed by `force_sync`.
            unsafe {
                open_options.flags(EnvFlags::NO_SYNC);
            }
        }
        // SAFETY: the environment is opened once per process for this path.
        let env = unsafe { open_options.open(path)? };

        let mut wtxn = env.write_txn()?;
        let blocks_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some(BLOCKS_DB))?;
        let history_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(HISTORY_DB))?;
        let meta_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        let environment = Self {
            env: Arc::new(env),
            path: path.to_path_buf(),
            no_sync: options.no_sync,
            blocks_db,
            history_db,
            meta_db,
        };

        Migrator::run(&environment.meta_store())?;
        tracing::info!(
            path = %path.display(),
            map_size = options.map_size,
            no_sync = options.no_sync,
            "LMDB environment opened"
        );
        Ok(environment)
    }

    /// The underlying heed environment.
    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store holding serialized blocks and the chain tip.
    pub fn block_store(&self) -> LmdbKvStore {
        LmdbKvStore::new(Arc::clone(&self.env), self.blocks_db, self.no_sync)
    }

    /// Store holding the history index and its savepoint.
    pub fn history_store(&self) -> LmdbKvStore {
        LmdbKvStore::new(Arc::clone(&self.env), self.history_db, self.no_sync)
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }

    /// Count the entries of every database, recording read failures.
    pub fn check_integrity(&self) -> Result<IntegrityReport, LmdbError> {
        check_integrity(&self.env)
    }

    /// Flush all committed writes to disk.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}
