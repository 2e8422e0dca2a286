//! The ordering service for one channel, wired over LMDB.

use std::sync::Arc;

use ledgerline_history::HistoryDb;
use ledgerline_ledger::{BlockLedger, KvLedger, Ledger};
use ledgerline_store::MetaStore;
use ledgerline_store_lmdb::{LmdbEnvironment, LmdbKvStore, LmdbOptions};
use ledgerline_types::Envelope;

use crate::chain::{ChainSupport, SoloChain};
use crate::config::OrdererConfig;
use crate::consenter::SoloConsenter;
use crate::events::EventBus;
use crate::metrics::OrdererMetrics;
use crate::processor::StandardMessageProcessor;
use crate::resources::{ChannelResources, ConfigResources};
use crate::shutdown::ShutdownController;
use crate::OrdererError;

/// Ledger type persisted by the service: blocks and history in one LMDB
/// environment.
pub type ChannelLedger = KvLedger<LmdbKvStore, LmdbKvStore>;

pub struct OrderingService {
    config: OrdererConfig,
    env: LmdbEnvironment,
    ledger: Arc<ChannelLedger>,
    resources: Arc<ChannelResources>,
    chain: SoloChain<ChannelLedger>,
    metrics: Arc<OrdererMetrics>,
}

impl OrderingService {
    pub fn open(config: &OrdererConfig) -> Result<Self, OrdererError> {
        Self::open_with_events(config, EventBus::new())
    }

    /// Open storage, restore the channel configuration from the ledger and
    /// build the (not yet started) chain.
    pub fn open_with_events(config: &OrdererConfig, events: EventBus) -> Result<Self, OrdererError> {
        config.validate()?;

        let options = LmdbOptions {
            map_size: config.lmdb_map_size,
            no_sync: config.lmdb_no_sync,
            ..LmdbOptions::default()
        };
        let env = LmdbEnvironment::open_with(&config.data_dir, &options)?;
        let report = env.check_integrity()?;
        if !report.is_healthy() {
            return Err(OrdererError::Config(format!(
                "storage integrity check failed: {}",
                report.errors.join("; ")
            )));
        }

        bind_channel(&env.meta_store(), &config.channel_id)?;

        let blocks = BlockLedger::open(env.block_store())?;
        let history = HistoryDb::new(env.history_store(), config.channel_id.clone(), config.history_enabled);
        let ledger = Arc::new(KvLedger::open(blocks, history)?);

        let resources = Arc::new(ChannelResources::from_config(config));
        let replayed = restore_config(ledger.as_ref(), resources.as_ref())?;

        tracing::info!(
            channel = %config.channel_id,
            height = ledger.height(),
            sequence = resources.sequence(),
            config_blocks = replayed,
            entries = report.total_entries,
            "ordering service opened"
        );

        let metrics = Arc::new(OrdererMetrics::new());
        let dyn_resources: Arc<dyn ConfigResources> = resources.clone();
        let support = ChainSupport {
            ledger: Arc::clone(&ledger),
            processor: Arc::new(StandardMessageProcessor::new(Arc::clone(&dyn_resources))),
            resources: dyn_resources,
            metrics: Arc::clone(&metrics),
            events,
            queue_capacity: config.queue_capacity,
            max_write_retries: config.max_write_retries,
        };
        let chain = SoloConsenter::new().handle_chain(support)?;

        Ok(Self {
            config: config.clone(),
            env,
            ledger,
            resources,
            chain,
            metrics,
        })
    }

    pub fn start(&self) -> Result<(), OrdererError> {
        self.chain.start()
    }

    pub fn submit(&self, envelope: Envelope) -> Result<(), OrdererError> {
        self.chain.submit(envelope)
    }

    pub fn wait_ready(&self) -> Result<(), OrdererError> {
        self.chain.wait_ready()
    }

    /// Halt the chain, flushing its pending batch, and sync storage.
    pub async fn halt(&self) -> Result<(), OrdererError> {
        self.chain.halt().await?;
        self.env.sync()?;
        Ok(())
    }

    /// Start the chain and keep it running until SIGINT or SIGTERM, then
    /// halt it.
    pub async fn run_until_signal(&self) -> Result<(), OrdererError> {
        self.start()?;
        ShutdownController::new().wait_for_signal().await;
        self.halt().await
    }

    pub fn chain(&self) -> &SoloChain<ChannelLedger> {
        &self.chain
    }

    pub fn ledger(&self) -> &Arc<ChannelLedger> {
        &self.ledger
    }

    pub fn resources(&self) -> &Arc<ChannelResources> {
        &self.resources
    }

    pub fn config(&self) -> &OrdererConfig {
        &self.config
    }

    /// Metrics in the Prometheus text format, when metrics are enabled.
    pub fn gather_metrics(&self) -> Option<String> {
        self.config.enable_metrics.then(|| self.metrics.gather_text())
    }
}

const CHANNEL_META_KEY: &str = "channel_id";

/// Record the channel a data directory belongs to, or check it matches.
fn bind_channel(meta: &impl MetaStore, channel_id: &str) -> Result<(), OrdererError> {
    match meta.get_meta(CHANNEL_META_KEY)? {
        None => {
            meta.put_meta(CHANNEL_META_KEY, channel_id.as_bytes())?;
            tracing::debug!(channel = %channel_id, "data directory bound to channel");
            Ok(())
        }
        Some(stored) if stored == channel_id.as_bytes() => Ok(()),
        Some(stored) => Err(OrdererError::Config(format!(
            "data directory belongs to channel '{}', not '{}'",
            String::from_utf8_lossy(&stored),
            channel_id
        ))),
    }
}

/// Re-apply every configuration block in the ledger, oldest first.
fn restore_config<L: Ledger>(ledger: &L, resources: &ChannelResources) -> Result<u64, OrdererError> {
    let mut applied = 0;
    for block in ledger.iterator(ledgerline_ledger::SeekPosition::Oldest) {
        let block = block?;
        if !block.is_config() {
            continue;
        }
        let number = block.number();
        resources
            .apply_config(&block.data[0])
            .map_err(|source| OrdererError::ConfigApply { number, source })?;
        applied += 1;
    }
    Ok(applied)
}
