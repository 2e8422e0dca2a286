//! Consenter: the factory that turns chain support into a running chain.

use ledgerline_ledger::Ledger;

use crate::chain::{ChainSupport, SoloChain};
use crate::OrdererError;

/// Single-node consenter. Each call builds an independent chain; there is
/// no process-wide instance.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoloConsenter;

impl SoloConsenter {
    pub fn new() -> Self {
        Self
    }

    /// Build the chain for one channel. The chain is not started.
    pub fn handle_chain<L: Ledger + 'static>(&self, support: ChainSupport<L>) -> Result<SoloChain<L>, OrdererError> {
        tracing::debug!(channel = %support.resources.channel_id(), "creating solo chain");
        SoloChain::new(support)
    }
}
