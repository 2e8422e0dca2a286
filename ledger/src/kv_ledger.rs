//! Block ledger plus history index, kept in step across crashes.

use ledgerline_history::HistoryDb;
use ledgerline_store::KvStore;
use ledgerline_types::{Block, Height};

use crate::{BlockLedger, Ledger, LedgerError};

/// One recorded write to a key, resolved from the block that made it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyModification {
    pub height: Height,
    pub tx_id: String,
    pub value: Vec<u8>,
    pub is_delete: bool,
}

/// A ledger whose appends also feed the history index.
///
/// The block append is the commit point. Indexing follows it; if indexing
/// fails the append still stands and the missed blocks are replayed from
/// the history savepoint on the next append or the next open.
pub struct KvLedger<B, H> {
    blocks: BlockLedger<B>,
    history: HistoryDb<H>,
}

impl<B: KvStore, H: KvStore> KvLedger<B, H> {
    /// Open the ledger and index any blocks the history has not seen.
    pub fn open(blocks: BlockLedger<B>, history: HistoryDb<H>) -> Result<Self, LedgerError> {
        let ledger = Self { blocks, history };
        ledger.catch_up_history()?;
        Ok(ledger)
    }

    pub fn blocks(&self) -> &BlockLedger<B> {
        &self.blocks
    }

    pub fn history(&self) -> &HistoryDb<H> {
        &self.history
    }

    /// Replay every block between the history savepoint and the chain tip.
    ///
    /// Returns the number of blocks indexed.
    pub fn catch_up_history(&self) -> Result<u64, LedgerError> {
        let height = self.blocks.height();
        if height == 0 {
            return Ok(0);
        }
        let Some(from) = self.history.recover_point(height - 1)? else {
            return Ok(0);
        };
        if from + 1 < height {
            tracing::info!(
                db = self.history.name(),
                from,
                to = height - 1,
                "replaying blocks into history index"
            );
        }
        for number in from..height {
            let block = self
                .blocks
                .block(number)?
                .ok_or(LedgerError::MissingBlock(number))?;
            self.history.commit_lost_block(&block)?;
        }
        Ok(height - from)
    }

    /// Every recorded write to `(namespace, key)`, oldest first.
    pub fn key_history(&self, namespace: &str, key: &str) -> Result<Vec<KeyModification>, LedgerError> {
        let mut out = Vec::new();
        for height in self.history.history_for_key(namespace, key)? {
            let block = self
                .blocks
                .block(height.block_num)?
                .ok_or(LedgerError::MissingBlock(height.block_num))?;
            let Some(envelope) = block.data.get(height.tx_num as usize) else {
                tracing::warn!(%height, "history entry points past the end of its block");
                continue;
            };
            let rwset = envelope.transaction_action()?.rwset()?;
            let last_write = rwset
                .writes()
                .filter(|(ns, w)| *ns == namespace && w.key == key)
                .map(|(_, w)| w)
                .last();
            if let Some(write) = last_write {
                out.push(KeyModification {
                    height,
                    tx_id: envelope.header.tx_id.clone(),
                    value: write.value.clone(),
                    is_delete: write.is_delete,
                });
            }
        }
        Ok(out)
    }
}

impl<B: KvStore, H: KvStore> Ledger for KvLedger<B, H> {
    fn append(&self, block: &Block) -> Result<(), LedgerError> {
        self.blocks.append(block)?;
        if let Err(e) = self.catch_up_history() {
            tracing::warn!(
                block = block.number(),
                error = %e,
                "history index update failed; will retry on next commit"
            );
        }
        Ok(())
    }

    fn height(&self) -> u64 {
        self.blocks.height()
    }

    fn block(&self, number: u64) -> Result<Option<Block>, LedgerError> {
        self.blocks.block(number)
    }
}
