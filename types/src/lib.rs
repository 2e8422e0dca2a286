//! Fundamental types for the Ledgerline ordering service.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! envelopes, blocks, block hashes, validation flags, write sets, ledger heights and
//! timestamps.

pub mod block;
pub mod envelope;
pub mod error;
pub mod flags;
pub mod height;
pub mod rwset;
pub mod time;

pub use block::{Block, BlockHash, BlockHeader, BlockMetadata};
pub use envelope::{Envelope, EnvelopeHeader, HeaderType};
pub use error::TypesError;
pub use flags::{TxValidationCode, ValidationFlags};
pub use height::Height;
pub use rwset::{KvWrite, NsRwSet, TransactionAction, TxRwSet};
pub use time::Timestamp;
