//! Forward block iteration.

use ledgerline_types::Block;

use crate::{Ledger, LedgerError};

/// Where a [`BlockIterator`] starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekPosition {
    Oldest,
    Newest,
    Specified(u64),
}

/// A lazy, finite forward iterator over blocks.
///
/// The iterator ends at the height the ledger had when it was created.
/// [`BlockIterator::position`] is the next block number to be yielded, so
/// iteration can be restarted later with `SeekPosition::Specified(position)`.
pub struct BlockIterator<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    next: u64,
    end: u64,
}

impl<'a, L: Ledger + ?Sized> BlockIterator<'a, L> {
    pub fn new(ledger: &'a L, start: SeekPosition) -> Self {
        let end = ledger.height();
        let next = match start {
            SeekPosition::Oldest => 0,
            SeekPosition::Newest => end.saturating_sub(1),
            SeekPosition::Specified(n) => n,
        };
        Self { ledger, next, end }
    }

    /// The next block number this iterator will yield.
    pub fn position(&self) -> u64 {
        self.next
    }
}

impl<L: Ledger + ?Sized> Iterator for BlockIterator<'_, L> {
    type Item = Result<Block, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let number = self.next;
        let item = match self.ledger.block(number) {
            Ok(Some(block)) => Ok(block),
            Ok(None) => Err(LedgerError::MissingBlock(number)),
            Err(e) => Err(e),
        };
        self.next += 1;
        Some(item)
    }
}
