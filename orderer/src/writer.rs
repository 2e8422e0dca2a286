//! Block writer: assembles blocks on top of the last written one and
//! appends them to the ledger.
//!
//! The writer's view of the chain tip only advances after a successful
//! append, so a failed block can be retried as-is without leaving a gap.

use std::sync::Arc;
use std::time::Instant;

use ledgerline_ledger::{assemble_block, block_hash, Ledger};
use ledgerline_types::{Block, BlockHash, Envelope};

use crate::events::{ChainEvent, EventBus};
use crate::logging::block_write_span;
use crate::metrics::OrdererMetrics;
use crate::resources::ConfigResources;
use crate::OrdererError;

pub struct BlockWriter<L> {
    ledger: Arc<L>,
    resources: Arc<dyn ConfigResources>,
    events: EventBus,
    metrics: Arc<OrdererMetrics>,
    next_number: u64,
    last_hash: BlockHash,
    last_config: u64,
}

impl<L: Ledger> BlockWriter<L> {
    /// Resume from the ledger's last block.
    pub fn new(
        ledger: Arc<L>,
        resources: Arc<dyn ConfigResources>,
        events: EventBus,
        metrics: Arc<OrdererMetrics>,
    ) -> Result<Self, OrdererError> {
        let (next_number, last_hash, last_config) = match ledger.last_block()? {
            Some(block) => (
                block.number() + 1,
                block_hash(&block),
                block.metadata.last_config,
            ),
            None => (0, BlockHash::ZERO, 0),
        };
        metrics.ledger_height.set(next_number as i64);
        metrics.config_sequence.set(resources.sequence() as i64);
        tracing::debug!(next_number, last_hash = %last_hash, last_config, "block writer initialised");
        Ok(Self {
            ledger,
            resources,
            events,
            metrics,
            next_number,
            last_hash,
            last_config,
        })
    }

    /// Assemble the block that would follow the last written one. Does not
    /// change the writer's state.
    pub fn create_next_block(&self, envelopes: Vec<Envelope>) -> Block {
        assemble_block(self.next_number, self.last_hash, envelopes)
    }

    /// Append an ordinary block.
    pub fn write_block(&mut self, mut block: Block, consenter_metadata: Vec<u8>) -> Result<(), OrdererError> {
        block.metadata.last_config = self.last_config;
        block.metadata.consenter = consenter_metadata;
        self.commit(&block)?;
        self.events.emit(&ChainEvent::BlockWritten {
            number: block.number(),
            tx_count: block.tx_count(),
            is_config: false,
        });
        Ok(())
    }

    /// Append a configuration block, then apply it to the channel
    /// resources. Later blocks record this block as their last config.
    ///
    /// A block whose configuration would not apply is refused before it
    /// reaches the ledger.
    pub fn write_config_block(&mut self, mut block: Block, consenter_metadata: Vec<u8>) -> Result<(), OrdererError> {
        let number = block.number();
        if !block.is_config() {
            return Err(OrdererError::InvalidConfigBlock(number));
        }
        self.resources.validate_config(&block.data[0])?;
        block.metadata.last_config = number;
        block.metadata.consenter = consenter_metadata;
        self.commit(&block)?;
        self.last_config = number;
        self.metrics.config_blocks_written.inc();
        self.events.emit(&ChainEvent::BlockWritten {
            number,
            tx_count: block.tx_count(),
            is_config: true,
        });

        let sequence = self
            .resources
            .apply_config(&block.data[0])
            .map_err(|source| OrdererError::ConfigApply { number, source })?;
        self.metrics.config_sequence.set(sequence as i64);
        self.events.emit(&ChainEvent::ConfigApplied { number, sequence });
        Ok(())
    }

    fn commit(&mut self, block: &Block) -> Result<(), OrdererError> {
        let number = block.number();
        let _span = block_write_span(number, block.tx_count(), block.is_config()).entered();

        let started = Instant::now();
        if let Err(e) = self.ledger.append(block) {
            self.metrics.write_failures.inc();
            tracing::warn!(block = number, error = %e, "block append failed");
            return Err(e.into());
        }
        self.metrics
            .block_write_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);

        self.next_number = number + 1;
        self.last_hash = block_hash(block);
        self.metrics.blocks_written.inc();
        self.metrics.ledger_height.set(self.next_number as i64);
        tracing::debug!(block = number, txs = block.tx_count(), "block written");
        Ok(())
    }

    /// Number the next assembled block will carry.
    pub fn next_number(&self) -> u64 {
        self.next_number
    }

    pub fn last_hash(&self) -> BlockHash {
        self.last_hash
    }

    /// Number of the most recent configuration block.
    pub fn last_config(&self) -> u64 {
        self.last_config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }
}
