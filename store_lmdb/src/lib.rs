//! LMDB storage backend for the Ledgerline ordering service.
//!
//! Implements the traits from `ledgerline-store` using the `heed` LMDB bindings.
//! Each logical keyspace (blocks, history, meta) maps to one LMDB database
//! within a single environment.

pub mod environment;
pub mod error;
pub mod integrity;
pub mod kv;
pub mod meta;
pub mod migration;

pub use environment::{LmdbEnvironment, LmdbOptions};
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use kv::LmdbKvStore;
pub use meta::LmdbMetaStore;
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};
