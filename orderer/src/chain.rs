//! The solo chain: a single consumer task that classifies, batches and
//! writes every envelope of one channel.

use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

use ledgerline_ledger::Ledger;
use ledgerline_types::{Block, Envelope};

use crate::classifier::{Cycle, MessageClassifier, PendingMessage, Track};
use crate::consumer::{run_consumer, Wake};
use crate::cutter::{Batch, BatchCutter};
use crate::events::{ChainEvent, EventBus};
use crate::logging::chain_span;
use crate::metrics::{CutReason, OrdererMetrics};
use crate::processor::MessageProcessor;
use crate::queue::EnvelopeQueue;
use crate::resources::ConfigResources;
use crate::shutdown::ShutdownController;
use crate::writer::BlockWriter;
use crate::OrdererError;

/// Everything a chain needs from its surroundings.
pub struct ChainSupport<L> {
    pub ledger: Arc<L>,
    pub resources: Arc<dyn ConfigResources>,
    pub processor: Arc<dyn MessageProcessor>,
    pub metrics: Arc<OrdererMetrics>,
    pub events: EventBus,
    pub queue_capacity: usize,
    /// Extra attempts for a block whose append failed.
    pub max_write_retries: u32,
}

/// A queued message and the track it was submitted on.
#[derive(Clone, Debug)]
pub struct Submission {
    pub track: Track,
    pub message: PendingMessage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Created,
    Running,
    Halted,
}

/// State owned by the consumer task.
struct ChainState<L> {
    classifier: MessageClassifier,
    cutter: BatchCutter,
    writer: BlockWriter<L>,
    resources: Arc<dyn ConfigResources>,
    processor: Arc<dyn MessageProcessor>,
    metrics: Arc<OrdererMetrics>,
    max_write_retries: u32,
}

impl<L: Ledger> ChainState<L> {
    fn handle(&mut self, wake: Wake<Submission>) {
        match wake {
            Wake::Message(sub) => {
                self.classifier.place(sub.track, sub.message);
                self.drain_classifier();
            }
            Wake::Deadline => {
                if let Some(batch) = self.cutter.expire(Instant::now()) {
                    self.metrics.record_cut(CutReason::Timeout);
                    self.write_normal(batch);
                }
            }
        }
        self.metrics.pending_envelopes.set(self.cutter.pending_len() as i64);
    }

    fn drain_classifier(&mut self) {
        loop {
            match self.classifier.next(self.resources.sequence(), self.processor.as_ref()) {
                Cycle::Config(envelope) => self.handle_config(envelope),
                Cycle::Normal(envelope) => self.handle_normal(envelope),
                Cycle::Discarded(..) => self.metrics.envelopes_discarded.inc(),
                Cycle::Idle => break,
            }
        }
    }

    fn handle_normal(&mut self, envelope: Envelope) {
        let (batches, pending) = self.cutter.ordered(envelope, Instant::now());
        for (batch, reason) in batches {
            self.metrics.record_cut(reason);
            self.write_normal(batch);
        }
        if pending {
            tracing::trace!(pending = self.cutter.pending_len(), "envelope pending in batch");
        }
    }

    fn handle_config(&mut self, envelope: Envelope) {
        // Configure callers vouch for their envelope; it still has to apply
        // before anything is cut or written.
        if let Err(e) = self.resources.validate_config(&envelope) {
            tracing::warn!(
                header_type = ?envelope.header_type(),
                error = %e,
                "discarding configuration envelope"
            );
            self.metrics.envelopes_discarded.inc();
            return;
        }
        let pending = self.cutter.cut();
        if pending.is_empty() {
            tracing::warn!("batch cut before configuration block was empty");
        } else {
            self.metrics.record_cut(CutReason::Forced);
            self.write_normal(pending);
        }
        let block = self.writer.create_next_block(vec![envelope]);
        self.write_with_retry(block, true);
        self.cutter
            .set_limits(self.resources.batch_size(), self.resources.batch_timeout());
    }

    fn write_normal(&mut self, batch: Batch) {
        let block = self.writer.create_next_block(batch);
        self.write_with_retry(block, false);
    }

    fn write_with_retry(&mut self, block: Block, is_config: bool) {
        let number = block.number();
        let mut attempt = 0u32;
        loop {
            let result = if is_config {
                self.writer.write_config_block(block.clone(), Vec::new())
            } else {
                self.writer.write_block(block.clone(), Vec::new())
            };
            match result {
                Ok(()) => return,
                Err(e) if e.is_retryable() && attempt < self.max_write_retries => {
                    attempt += 1;
                    tracing::warn!(block = number, attempt, error = %e, "retrying block write");
                }
                Err(e @ OrdererError::ConfigApply { .. }) => {
                    tracing::error!(block = number, error = %e, "configuration block written but not applied");
                    return;
                }
                Err(e) => {
                    tracing::error!(
                        block = number,
                        txs = block.tx_count(),
                        attempts = attempt + 1,
                        error = %e,
                        "dropping block after failed writes"
                    );
                    self.metrics.blocks_dropped.inc();
                    self.writer.events().emit(&ChainEvent::BlockDropped {
                        number,
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }
    }

    /// Write whatever the cutter still holds.
    fn flush(&mut self) {
        let batch = self.cutter.cut();
        if !batch.is_empty() {
            tracing::debug!(txs = batch.len(), "flushing pending batch on halt");
            self.metrics.record_cut(CutReason::Forced);
            self.write_normal(batch);
        }
        self.metrics.pending_envelopes.set(0);
    }
}

/// A running (or startable) solo chain.
pub struct SoloChain<L> {
    channel_id: String,
    queue: EnvelopeQueue<Submission>,
    resources: Arc<dyn ConfigResources>,
    processor: Arc<dyn MessageProcessor>,
    metrics: Arc<OrdererMetrics>,
    shutdown: ShutdownController,
    status: Mutex<Status>,
    startup: Mutex<Option<(mpsc::Receiver<Submission>, ChainState<L>)>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<L: Ledger + 'static> SoloChain<L> {
    pub fn new(support: ChainSupport<L>) -> Result<Self, OrdererError> {
        let ChainSupport {
            ledger,
            resources,
            processor,
            metrics,
            events,
            queue_capacity,
            max_write_retries,
        } = support;

        let writer = BlockWriter::new(ledger, Arc::clone(&resources), events, Arc::clone(&metrics))?;
        let state = ChainState {
            classifier: MessageClassifier::new(),
            cutter: BatchCutter::new(resources.batch_size(), resources.batch_timeout()),
            writer,
            resources: Arc::clone(&resources),
            processor: Arc::clone(&processor),
            metrics: Arc::clone(&metrics),
            max_write_retries,
        };
        let (queue, rx) = EnvelopeQueue::new(queue_capacity);

        Ok(Self {
            channel_id: resources.channel_id().to_string(),
            queue,
            resources,
            processor,
            metrics,
            shutdown: ShutdownController::new(),
            status: Mutex::new(Status::Created),
            startup: Mutex::new(Some((rx, state))),
            handle: Mutex::new(None),
        })
    }

    /// Spawn the consumer task on the current tokio runtime.
    pub fn start(&self) -> Result<(), OrdererError> {
        let mut status = self.status.lock().unwrap();
        match *status {
            Status::Running => return Err(OrdererError::AlreadyStarted),
            Status::Halted => return Err(OrdererError::Halted),
            Status::Created => {}
        }
        let runtime = Handle::try_current().map_err(|_| OrdererError::NoRuntime)?;
        let (rx, state) = self
            .startup
            .lock()
            .unwrap()
            .take()
            .ok_or(OrdererError::AlreadyStarted)?;

        let shutdown = self.shutdown.signal();
        let task = async move {
            tracing::info!("chain started");
            let mut state = run_consumer(
                rx,
                shutdown,
                state,
                |s: &ChainState<L>| s.cutter.deadline(),
                |s: &mut ChainState<L>, wake| s.handle(wake),
            )
            .await;
            state.flush();
            tracing::info!(height = state.writer.next_number(), "chain stopped");
        };
        let handle = runtime.spawn(task.instrument(chain_span(&self.channel_id)));
        *self.handle.lock().unwrap() = Some(handle);
        *status = Status::Running;
        Ok(())
    }

    /// Enqueue a normal envelope already validated at `config_seq`.
    pub fn order(&self, envelope: Envelope, config_seq: u64) -> bool {
        self.enqueue(Track::Normal, envelope, config_seq)
    }

    /// Enqueue a configuration envelope already validated at `config_seq`.
    pub fn configure(&self, envelope: Envelope, config_seq: u64) -> bool {
        self.enqueue(Track::Config, envelope, config_seq)
    }

    fn enqueue(&self, track: Track, envelope: Envelope, config_seq: u64) -> bool {
        let accepted = self.queue.submit(Submission {
            track,
            message: PendingMessage::new(envelope, config_seq),
        });
        if accepted {
            self.metrics.envelopes_received.inc();
        } else {
            self.metrics.envelopes_rejected.inc();
        }
        accepted
    }

    /// Validate `envelope`, tag it with the current sequence and enqueue it
    /// on the track its header type selects.
    pub fn submit(&self, envelope: Envelope) -> Result<(), OrdererError> {
        let track = Track::of(&envelope);
        let checked = match track {
            Track::Normal => self
                .processor
                .process_normal_msg(&envelope)
                .map(|seq| (envelope, seq)),
            Track::Config => self.processor.process_config_msg(&envelope),
        };
        let (envelope, config_seq) = match checked {
            Ok(ok) => ok,
            Err(e) => {
                self.metrics.envelopes_rejected.inc();
                tracing::debug!(track = track.as_str(), error = %e, "submission rejected");
                return Err(e.into());
            }
        };
        if self.enqueue(track, envelope, config_seq) {
            return Ok(());
        }
        if self.queue.is_closed() {
            Err(OrdererError::Halted)
        } else {
            Err(OrdererError::QueueFull)
        }
    }

    /// Ok while the consumer task is running.
    pub fn wait_ready(&self) -> Result<(), OrdererError> {
        match *self.status.lock().unwrap() {
            Status::Created => Err(OrdererError::NotStarted),
            Status::Halted => Err(OrdererError::Halted),
            Status::Running => {
                let finished = self
                    .handle
                    .lock()
                    .unwrap()
                    .as_ref()
                    .map_or(true, |h| h.is_finished());
                if finished {
                    Err(OrdererError::Halted)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Stop accepting submissions, let the consumer drain the queue and
    /// flush its pending batch, then wait for it to exit.
    pub async fn halt(&self) -> Result<(), OrdererError> {
        {
            let mut status = self.status.lock().unwrap();
            if *status == Status::Halted {
                return Ok(());
            }
            *status = Status::Halted;
        }
        self.queue.close();
        self.shutdown.shutdown();

        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.await.map_err(|e| OrdererError::Task(e.to_string()))?;
        }
        tracing::info!(channel = %self.channel_id, "chain halted");
        Ok(())
    }

    /// Configuration sequence currently in effect.
    pub fn sequence(&self) -> u64 {
        self.resources.sequence()
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Submissions waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> &Arc<OrdererMetrics> {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchSize;
    use crate::processor::StandardMessageProcessor;
    use crate::resources::{ChannelResources, ConsenterConfigUpdate};
    use ledgerline_ledger::BlockLedger;
    use ledgerline_nullables::NullKvStore;
    use ledgerline_types::HeaderType;
    use std::time::Duration;

    type TestLedger = BlockLedger<Arc<NullKvStore>>;

    fn chain(max_message_count: u32, capacity: usize) -> (Arc<TestLedger>, SoloChain<TestLedger>) {
        let ledger = Arc::new(BlockLedger::open(Arc::new(NullKvStore::new())).unwrap());
        let resources: Arc<dyn ConfigResources> = Arc::new(ChannelResources::new(
            "ch",
            Duration::from_millis(500),
            BatchSize {
                max_message_count,
                ..BatchSize::default()
            },
        ));
        let support = ChainSupport {
            ledger: Arc::clone(&ledger),
            processor: Arc::new(StandardMessageProcessor::new(Arc::clone(&resources))),
            resources,
            metrics: Arc::new(OrdererMetrics::new()),
            events: EventBus::new(),
            queue_capacity: capacity,
            max_write_retries: 1,
        };
        (ledger, SoloChain::new(support).unwrap())
    }

    fn msg(payload: &[u8]) -> Envelope {
        Envelope::new(HeaderType::Message, "ch", payload.to_vec())
    }

    #[tokio::test]
    async fn lifecycle_states() {
        let (_ledger, chain) = chain(10, 8);
        assert!(matches!(chain.wait_ready(), Err(OrdererError::NotStarted)));
        chain.start().unwrap();
        assert!(chain.wait_ready().is_ok());
        assert!(matches!(chain.start(), Err(OrdererError::AlreadyStarted)));

        chain.halt().await.unwrap();
        assert!(matches!(chain.wait_ready(), Err(OrdererError::Halted)));
        assert!(matches!(chain.start(), Err(OrdererError::Halted)));
        chain.halt().await.unwrap();
    }

    #[test]
    fn start_outside_a_runtime_is_an_error() {
        let (_ledger, chain) = chain(10, 8);
        assert!(matches!(chain.start(), Err(OrdererError::NoRuntime)));
        assert!(matches!(chain.wait_ready(), Err(OrdererError::NotStarted)));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            chain.start().unwrap();
            chain.halt().await.unwrap();
        });
    }

    #[tokio::test]
    async fn configure_discards_envelopes_that_would_not_apply() {
        let (ledger, chain) = chain(10, 16);
        chain.start().unwrap();
        chain.submit(msg(b"a")).unwrap();
        assert!(chain.configure(Envelope::new(HeaderType::Config, "ch", b"{oops".to_vec()), 0));
        assert!(chain.configure(msg(b"not config"), 0));
        chain.halt().await.unwrap();

        // The pending batch is untouched by the discards and flushed on halt.
        assert_eq!(ledger.height(), 1);
        let block = ledger.block(0).unwrap().unwrap();
        assert!(!block.is_config());
        assert_eq!(block.tx_count(), 1);
        assert_eq!(chain.sequence(), 0);
        assert_eq!(chain.metrics().envelopes_discarded.get(), 2);
        assert_eq!(chain.metrics().blocks_dropped.get(), 0);
    }

    #[tokio::test]
    async fn submit_rejects_invalid_envelopes() {
        let (_ledger, chain) = chain(10, 8);
        let err = chain.submit(msg(b"")).unwrap_err();
        assert!(matches!(err, OrdererError::Rejected(_)));

        let bad_config = Envelope::new(HeaderType::Config, "ch", b"nope".to_vec());
        assert!(matches!(chain.submit(bad_config), Err(OrdererError::Rejected(_))));
        assert_eq!(chain.metrics().envelopes_rejected.get(), 2);
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let (_ledger, chain) = chain(10, 2);
        chain.submit(msg(b"1")).unwrap();
        chain.submit(msg(b"2")).unwrap();
        assert!(matches!(chain.submit(msg(b"3")), Err(OrdererError::QueueFull)));
        assert_eq!(chain.queued(), 2);
    }

    #[tokio::test]
    async fn halt_drains_queue_and_flushes() {
        let (ledger, chain) = chain(10, 16);
        for i in 0..3u8 {
            chain.submit(msg(&[i])).unwrap();
        }
        chain.start().unwrap();
        chain.halt().await.unwrap();

        assert_eq!(ledger.height(), 1);
        assert_eq!(ledger.block(0).unwrap().unwrap().tx_count(), 3);
        assert!(matches!(chain.submit(msg(b"late")), Err(OrdererError::Halted)));
    }

    #[tokio::test]
    async fn config_flushes_pending_batch_first() {
        let (ledger, chain) = chain(10, 16);
        chain.start().unwrap();
        chain.submit(msg(b"a")).unwrap();
        let update = ConsenterConfigUpdate {
            batch_timeout_ms: Some(50),
            batch_size: None,
        };
        chain
            .submit(Envelope::new(HeaderType::ConfigUpdate, "ch", update.to_payload()))
            .unwrap();
        chain.halt().await.unwrap();

        assert_eq!(ledger.height(), 2);
        assert!(!ledger.block(0).unwrap().unwrap().is_config());
        let cfg = ledger.block(1).unwrap().unwrap();
        assert!(cfg.is_config());
        assert_eq!(cfg.data[0].header_type(), HeaderType::Config);
        assert_eq!(chain.sequence(), 1);
    }
}
