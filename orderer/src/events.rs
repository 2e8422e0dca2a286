//! Events emitted by the block writer for subscribers.

/// Chain-level events that observers can subscribe to via the [`EventBus`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainEvent {
    /// A block was appended to the ledger.
    BlockWritten {
        number: u64,
        tx_count: usize,
        is_config: bool,
    },
    /// A configuration block took effect, raising the sequence.
    ConfigApplied { number: u64, sequence: u64 },
    /// A block was dropped after exhausting its write retries.
    BlockDropped { number: u64, reason: String },
}

/// Synchronous fan-out event bus for chain events.
///
/// Listeners are invoked inline on the consumer task; keep handlers fast to
/// avoid stalling block writing.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&ChainEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&ChainEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &ChainEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
