//! Ledger height: a position identified by block and transaction number.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// Encoded length of a [`Height`]: 8-byte block number + 4-byte tx number.
pub const HEIGHT_LEN: usize = 12;

/// A `(block_num, tx_num)` position, ordered by block then transaction.
///
/// Used as the history savepoint: the last block fully indexed and the number
/// of transactions it contained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Height {
    pub block_num: u64,
    pub tx_num: u32,
}

impl Height {
    pub fn new(block_num: u64, tx_num: u32) -> Self {
        Self { block_num, tx_num }
    }

    /// Big-endian encoding so that byte order matches numeric order.
    pub fn to_bytes(&self) -> [u8; HEIGHT_LEN] {
        let mut out = [0u8; HEIGHT_LEN];
        out[..8].copy_from_slice(&self.block_num.to_be_bytes());
        out[8..].copy_from_slice(&self.tx_num.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() != HEIGHT_LEN {
            return Err(TypesError::InvalidHeight {
                expected: HEIGHT_LEN,
                actual: bytes.len(),
            });
        }
        let mut block = [0u8; 8];
        block.copy_from_slice(&bytes[..8]);
        let mut tx = [0u8; 4];
        tx.copy_from_slice(&bytes[8..]);
        Ok(Self {
            block_num: u64::from_be_bytes(block),
            tx_num: u32::from_be_bytes(tx),
        })
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_num, self.tx_num)
    }
}
