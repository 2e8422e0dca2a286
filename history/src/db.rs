//! The history database: per-block indexing, savepoint and recovery.

use ledgerline_store::{KvStore, UpdateBatch};
use ledgerline_types::{Block, HeaderType, Height, ValidationFlags};

use crate::keys::{composite_history_key, decode_history_key, key_prefix, SAVEPOINT_KEY};
use crate::HistoryError;

/// Where indexing must resume after a restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryStatus {
    /// History indexing is switched off; nothing to recover.
    Disabled,
    /// No savepoint has ever been written; every block must be indexed.
    FullRebuild,
    /// Blocks up to the savepoint are indexed; resume from this block.
    ResumeFrom(u64),
}

/// Commit-time history indexer over an ordered key-value store.
pub struct HistoryDb<S> {
    store: S,
    name: String,
    enabled: bool,
}

impl<S: KvStore> HistoryDb<S> {
    pub fn new(store: S, name: impl Into<String>, enabled: bool) -> Self {
        Self {
            store,
            name: name.into(),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index every write of every valid endorser transaction in `block` and
    /// advance the savepoint, all in one durable batch.
    ///
    /// A disabled indexer does nothing. Transactions whose write set cannot
    /// be decoded are skipped without failing the block.
    pub fn commit(&self, block: &Block) -> Result<(), HistoryError> {
        if !self.enabled {
            return Ok(());
        }
        let block_num = block.number();
        let _span = tracing::debug_span!("history_commit", db = %self.name, block = block_num).entered();
        tracing::debug!(txs = block.tx_count(), "updating history index");

        // An empty filter means every transaction is valid. The appended
        // block is immutable, so the materialized filter is used for this
        // commit only and the stored block keeps its empty filter.
        let flags = if block.metadata.transactions_filter.is_empty() {
            ValidationFlags::all_valid(block.tx_count())
        } else {
            block.metadata.transactions_filter.clone()
        };

        let mut batch = UpdateBatch::new();
        let mut entries = 0usize;
        for (tx_num, envelope) in block.data.iter().enumerate() {
            if flags.is_invalid(tx_num) {
                tracing::debug!(tx = tx_num, "skipping invalid transaction");
                continue;
            }
            if envelope.header_type() != HeaderType::EndorserTransaction {
                tracing::debug!(
                    tx = tx_num,
                    header_type = ?envelope.header_type(),
                    "skipping non-endorser transaction"
                );
                continue;
            }
            let rwset = match envelope
                .transaction_action()
                .and_then(|action| action.rwset())
            {
                Ok(rwset) => rwset,
                Err(e) => {
                    tracing::debug!(tx = tx_num, error = %e, "skipping undecodable write set");
                    continue;
                }
            };
            for (namespace, write) in rwset.writes() {
                let key = composite_history_key(namespace, &write.key, block_num, tx_num as u32);
                batch.put(key, Vec::new());
                entries += 1;
            }
        }

        let savepoint = Height::new(block_num, block.tx_count() as u32);
        batch.put(SAVEPOINT_KEY, savepoint.to_bytes().to_vec());
        self.store.write_batch(batch, true)?;

        tracing::debug!(entries, savepoint = %savepoint, "history index committed");
        Ok(())
    }

    /// Re-index a block that was committed to the ledger but not indexed
    /// before a crash. Indexing is idempotent, so replaying is always safe.
    pub fn commit_lost_block(&self, block: &Block) -> Result<(), HistoryError> {
        self.commit(block)
    }

    /// The last fully indexed position, if any block was ever indexed.
    pub fn last_savepoint(&self) -> Result<Option<Height>, HistoryError> {
        match self.store.get(SAVEPOINT_KEY)? {
            Some(bytes) => Ok(Some(Height::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn should_recover(&self) -> Result<RecoveryStatus, HistoryError> {
        if !self.enabled {
            return Ok(RecoveryStatus::Disabled);
        }
        Ok(match self.last_savepoint()? {
            None => RecoveryStatus::FullRebuild,
            Some(sp) => RecoveryStatus::ResumeFrom(sp.block_num + 1),
        })
    }

    /// First block to re-index given the last block the ledger holds.
    ///
    /// Returns `None` when indexing is disabled or the index has already
    /// caught up with `last_available_block`.
    pub fn recover_point(&self, last_available_block: u64) -> Result<Option<u64>, HistoryError> {
        let from = match self.should_recover()? {
            RecoveryStatus::Disabled => return Ok(None),
            RecoveryStatus::FullRebuild => 0,
            RecoveryStatus::ResumeFrom(n) => n,
        };
        if from > last_available_block {
            return Ok(None);
        }
        Ok(Some(from))
    }

    /// Every position that wrote `(namespace, key)`, in ascending commit order.
    pub fn history_for_key(&self, namespace: &str, key: &str) -> Result<Vec<Height>, HistoryError> {
        let prefix = key_prefix(namespace, key);
        let mut out = Vec::new();
        for (composite, _) in self.store.scan_prefix(&prefix)? {
            // A key containing the separator can share a longer prefix.
            if composite.len() != prefix.len() + 12 {
                continue;
            }
            out.push(decode_history_key(&composite)?);
        }
        Ok(out)
    }
}
