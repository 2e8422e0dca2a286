//! Blocks of the totally ordered ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::envelope::Envelope;
use crate::flags::ValidationFlags;
use crate::TypesError;

/// A 32-byte hash: identifies a block header or the data of a block.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHash([u8; 32]);

impl Default for BlockHash {
    fn default() -> Self {
        Self::ZERO
    }
}

impl BlockHash {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Block header: position in the chain and the two hashes that link it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    /// Hash of the previous block's header (zero for the genesis block).
    pub previous_hash: BlockHash,
    /// Hash over the block's ordered envelopes.
    pub data_hash: BlockHash,
}

impl BlockHeader {
    /// Canonical byte layout hashed to produce the header hash:
    /// `number_be(8) ++ previous_hash(32) ++ data_hash(32)`.
    pub fn canonical_bytes(&self) -> [u8; 72] {
        let mut out = [0u8; 72];
        out[..8].copy_from_slice(&self.number.to_be_bytes());
        out[8..40].copy_from_slice(self.previous_hash.as_bytes());
        out[40..].copy_from_slice(self.data_hash.as_bytes());
        out
    }
}

/// Metadata attached to a block after assembly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Validity of each transaction; empty means all valid.
    pub transactions_filter: ValidationFlags,
    /// Number of the most recent configuration block at or before this block.
    pub last_config: u64,
    /// Opaque metadata supplied by the consenter when the block was written.
    pub consenter: Vec<u8>,
}

/// An immutable block: header, ordered envelopes, metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub data: Vec<Envelope>,
    pub metadata: BlockMetadata,
}

impl Block {
    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn tx_count(&self) -> usize {
        self.data.len()
    }

    /// Whether this block carries a configuration envelope.
    pub fn is_config(&self) -> bool {
        self.data.len() == 1 && self.data[0].is_config()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TypesError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::HeaderType;

    fn header(number: u64) -> BlockHeader {
        BlockHeader {
            number,
            previous_hash: BlockHash::new([1u8; 32]),
            data_hash: BlockHash::new([2u8; 32]),
        }
    }

    #[test]
    fn canonical_bytes_layout() {
        let bytes = header(0x0102).canonical_bytes();
        assert_eq!(&bytes[..8], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert!(bytes[8..40].iter().all(|b| *b == 1));
        assert!(bytes[40..].iter().all(|b| *b == 2));
    }

    #[test]
    fn single_config_envelope_makes_a_config_block() {
        let block = Block {
            header: header(3),
            data: vec![Envelope::new(HeaderType::Config, "ch", b"cfg".to_vec())],
            metadata: BlockMetadata::default(),
        };
        assert!(block.is_config());
        assert_eq!(block.tx_count(), 1);
    }

    #[test]
    fn block_decodes_what_it_encodes() {
        let block = Block {
            header: header(9),
            data: vec![Envelope::new(HeaderType::Message, "ch", b"m".to_vec())],
            metadata: BlockMetadata {
                transactions_filter: ValidationFlags::all_valid(1),
                last_config: 4,
                consenter: b"solo".to_vec(),
            },
        };
        let decoded = Block::from_bytes(&block.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn debug_shows_short_prefix() {
        let h = BlockHash::new([0xab; 32]);
        assert_eq!(format!("{:?}", h), "BlockHash(abababab)");
        assert!(BlockHash::ZERO.is_zero());
    }
}
