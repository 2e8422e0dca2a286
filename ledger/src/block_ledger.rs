//! Block chain persisted in a key-value store.
//!
//! Layout:
//! - `b ++ number_be(8)` → bincode [`Block`]
//! - `height` → next block number, big-endian u64
//!
//! A block and the new height are written in one durable batch, so the
//! stored height never points past a block that is not on disk.

use std::sync::Mutex;

use ledgerline_crypto::hash_block_data;
use ledgerline_store::{KvStore, StoreError, UpdateBatch};
use ledgerline_types::{Block, BlockHash};

use crate::assembler::block_hash;
use crate::{Ledger, LedgerError};

const BLOCK_PREFIX: u8 = b'b';
const HEIGHT_KEY: &[u8] = b"height";

fn block_key(number: u64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = BLOCK_PREFIX;
    key[1..].copy_from_slice(&number.to_be_bytes());
    key
}

/// In-memory view of the chain tip.
#[derive(Clone, Copy, Debug)]
struct Tip {
    height: u64,
    last_hash: BlockHash,
}

/// An append-only chain of blocks over a [`KvStore`].
pub struct BlockLedger<S> {
    store: S,
    tip: Mutex<Tip>,
}

impl<S: KvStore> BlockLedger<S> {
    /// Open the chain stored in `store`, loading its tip.
    pub fn open(store: S) -> Result<Self, LedgerError> {
        let height = match store.get(HEIGHT_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Corruption(format!("height has {} bytes", bytes.len()))
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        let last_hash = if height == 0 {
            BlockHash::ZERO
        } else {
            let bytes = store
                .get(&block_key(height - 1))?
                .ok_or(LedgerError::MissingBlock(height - 1))?;
            block_hash(&Block::from_bytes(&bytes)?)
        };
        tracing::debug!(height, last_hash = %last_hash, "block ledger opened");
        Ok(Self {
            store,
            tip: Mutex::new(Tip { height, last_hash }),
        })
    }

    /// Hash of the last block header, zero for an empty chain.
    pub fn last_hash(&self) -> BlockHash {
        self.tip.lock().unwrap().last_hash
    }
}

impl<S: KvStore> Ledger for BlockLedger<S> {
    fn append(&self, block: &Block) -> Result<(), LedgerError> {
        let mut tip = self.tip.lock().unwrap();
        let number = block.number();
        if number != tip.height {
            return Err(LedgerError::UnexpectedNumber {
                expected: tip.height,
                actual: number,
            });
        }
        if block.header.previous_hash != tip.last_hash {
            return Err(LedgerError::PreviousHashMismatch { number });
        }
        if block.header.data_hash != hash_block_data(&block.data) {
            return Err(LedgerError::DataHashMismatch { number });
        }

        let mut batch = UpdateBatch::new();
        batch.put(block_key(number).to_vec(), block.to_bytes()?);
        batch.put(HEIGHT_KEY, (number + 1).to_be_bytes().to_vec());
        self.store.write_batch(batch, true)?;

        tip.height = number + 1;
        tip.last_hash = block_hash(block);
        tracing::debug!(block = number, txs = block.tx_count(), "block appended");
        Ok(())
    }

    fn height(&self) -> u64 {
        self.tip.lock().unwrap().height
    }

    fn block(&self, number: u64) -> Result<Option<Block>, LedgerError> {
        match self.store.get(&block_key(number))? {
            Some(bytes) => Ok(Some(Block::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }
}
