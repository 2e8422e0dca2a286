//! Ledgerline orderer: the single-sequencer ordering service.
//!
//! Submitted envelopes flow through:
//! - the [`EnvelopeQueue`], a bounded FIFO that rejects instead of blocking
//! - the [`MessageClassifier`], which serves the config track first and
//!   re-validates messages made stale by a configuration change
//! - the [`BatchCutter`], which groups normal envelopes by count, bytes and
//!   time
//! - the [`BlockWriter`], which assembles linked blocks and appends them to
//!   the ledger (and through it, the history index)
//!
//! A [`SoloChain`] runs all of this on one consumer task.
//! [`OrderingService`] wires a chain over LMDB storage.

pub mod chain;
pub mod classifier;
pub mod config;
pub mod consenter;
pub mod consumer;
pub mod cutter;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod queue;
pub mod resources;
pub mod service;
pub mod shutdown;
pub mod writer;

pub use chain::{ChainSupport, SoloChain, Submission};
pub use classifier::{Cycle, MessageClassifier, PendingMessage, PendingSlot, Track};
pub use config::{BatchSize, OrdererConfig};
pub use consenter::SoloConsenter;
pub use consumer::{run_consumer, Wake};
pub use cutter::{Batch, BatchCutter};
pub use error::{OrdererError, ProcessError};
pub use events::{ChainEvent, EventBus};
pub use logging::{init_logging, LogFormat};
pub use metrics::{CutReason, OrdererMetrics};
pub use processor::{MessageProcessor, StandardMessageProcessor};
pub use queue::EnvelopeQueue;
pub use resources::{ChannelResources, ConfigResources, ConsenterConfigUpdate};
pub use service::{ChannelLedger, OrderingService};
pub use shutdown::{ShutdownController, ShutdownSignal};
pub use writer::BlockWriter;
