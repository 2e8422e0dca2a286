//! Hashing primitives for Ledgerline.
//!
//! - **Blake2b-256** for block header hashes and block data hashes
//!
//! Signing and identity are provided by the membership service and are not
//! part of this workspace.

pub mod hash;

pub use hash::{blake2b_256, hash_block_data, hash_header};
