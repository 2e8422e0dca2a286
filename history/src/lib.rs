//! History index for the Ledgerline ledger.
//!
//! On every ledger commit the indexer records one presence-only entry per
//! `(namespace, key)` written by each valid endorser transaction, together
//! with a savepoint marking the last fully indexed block. The savepoint is
//! written in the same atomic batch as the entries, so after a crash the
//! index is replayed from the block after the savepoint.

pub mod db;
pub mod error;
pub mod keys;

pub use db::{HistoryDb, RecoveryStatus};
pub use error::HistoryError;
pub use keys::{composite_history_key, decode_history_key, key_prefix, SAVEPOINT_KEY};
