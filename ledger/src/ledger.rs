//! The ledger interface consumed by the ordering service.

use ledgerline_types::Block;

use crate::iterator::{BlockIterator, SeekPosition};
use crate::LedgerError;

/// An append-only, totally ordered chain of blocks.
pub trait Ledger: Send + Sync {
    /// Append the next block. Fails without side effects when the block does
    /// not extend the chain or the store rejects the write.
    fn append(&self, block: &Block) -> Result<(), LedgerError>;

    /// Number of blocks in the chain (the next block number to append).
    fn height(&self) -> u64;

    /// Read a block by number.
    fn block(&self, number: u64) -> Result<Option<Block>, LedgerError>;

    /// The most recently appended block.
    fn last_block(&self) -> Result<Option<Block>, LedgerError> {
        match self.height() {
            0 => Ok(None),
            h => self.block(h - 1),
        }
    }

    /// Lazily iterate the chain from `start` up to the current height.
    fn iterator(&self, start: SeekPosition) -> BlockIterator<'_, Self>
    where
        Self: Sized,
    {
        BlockIterator::new(self, start)
    }
}
