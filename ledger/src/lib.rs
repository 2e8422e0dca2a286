//! Append-only block ledger.
//!
//! Blocks form a single hash-linked chain numbered from zero without gaps.
//! [`BlockLedger`] persists the chain; [`KvLedger`] adds the history index
//! and keeps it caught up with the chain across crashes.

pub mod assembler;
pub mod block_ledger;
pub mod error;
pub mod iterator;
pub mod kv_ledger;
pub mod ledger;

pub use assembler::{assemble_block, block_hash};
pub use block_ledger::BlockLedger;
pub use error::LedgerError;
pub use iterator::{BlockIterator, SeekPosition};
pub use kv_ledger::{KeyModification, KvLedger};
pub use ledger::Ledger;
