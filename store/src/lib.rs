//! Abstract storage traits for the Ledgerline ordering service.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The ledger and the history indexer depend only on the traits.

pub mod batch;
pub mod error;
pub mod kv;
pub mod meta;

pub use batch::{BatchOp, UpdateBatch};
pub use error::StoreError;
pub use kv::{increment_prefix, KvStore};
pub use meta::{MetaStore, SCHEMA_VERSION_KEY};
