//! Prometheus metrics for the orderer.
//!
//! [`OrdererMetrics`] owns a dedicated [`Registry`] covering submission,
//! batching and block writing. [`OrdererMetrics::gather_text`] encodes it in
//! the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Why a batch was cut.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CutReason {
    /// The batch reached the message count or preferred byte limit.
    Size,
    /// The next envelope would have pushed the batch past the byte limit.
    Overflow,
    /// A single envelope larger than the preferred limit, cut alone.
    Oversized,
    /// The batch timer expired.
    Timeout,
    /// Flushed ahead of a configuration block or on halt.
    Forced,
}

impl CutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CutReason::Size => "size",
            CutReason::Overflow => "overflow",
            CutReason::Oversized => "oversized",
            CutReason::Timeout => "timeout",
            CutReason::Forced => "forced",
        }
    }
}

/// Central collection of all orderer-level Prometheus metrics.
pub struct OrdererMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Envelopes accepted onto the submission queue.
    pub envelopes_received: IntCounter,
    /// Envelopes refused at submission (invalid, queue full or halted).
    pub envelopes_rejected: IntCounter,
    /// Stale envelopes that failed re-validation and were dropped.
    pub envelopes_discarded: IntCounter,
    /// Batches cut, labelled by reason.
    pub batches_cut: IntCounterVec,
    /// Blocks appended to the ledger.
    pub blocks_written: IntCounter,
    /// Configuration blocks appended to the ledger.
    pub config_blocks_written: IntCounter,
    /// Failed block write attempts.
    pub write_failures: IntCounter,
    /// Blocks dropped after exhausting their retries.
    pub blocks_dropped: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Envelopes waiting in the batch cutter.
    pub pending_envelopes: IntGauge,
    /// Current number of blocks in the ledger.
    pub ledger_height: IntGauge,
    /// Current configuration sequence.
    pub config_sequence: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent appending a block, in milliseconds.
    pub block_write_time_ms: Histogram,
}

impl OrdererMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        // Counters
        let envelopes_received = register_int_counter_with_registry!(
            Opts::new(
                "ledgerline_envelopes_received_total",
                "Envelopes accepted onto the submission queue"
            ),
            registry
        )
        .expect("failed to register envelopes_received counter");

        let envelopes_rejected = register_int_counter_with_registry!(
            Opts::new(
                "ledgerline_envelopes_rejected_total",
                "Envelopes refused at submission"
            ),
            registry
        )
        .expect("failed to register envelopes_rejected counter");

        let envelopes_discarded = register_int_counter_with_registry!(
            Opts::new(
                "ledgerline_envelopes_discarded_total",
                "Stale envelopes discarded after failing re-validation"
            ),
            registry
        )
        .expect("failed to register envelopes_discarded counter");

        let batches_cut = register_int_counter_vec_with_registry!(
            Opts::new("ledgerline_batches_cut_total", "Batches cut by reason"),
            &["reason"],
            registry
        )
        .expect("failed to register batches_cut counter");

        let blocks_written = register_int_counter_with_registry!(
            Opts::new(
                "ledgerline_blocks_written_total",
                "Blocks appended to the ledger"
            ),
            registry
        )
        .expect("failed to register blocks_written counter");

        let config_blocks_written = register_int_counter_with_registry!(
            Opts::new(
                "ledgerline_config_blocks_written_total",
                "Configuration blocks appended to the ledger"
            ),
            registry
        )
        .expect("failed to register config_blocks_written counter");

        let write_failures = register_int_counter_with_registry!(
            Opts::new(
                "ledgerline_block_write_failures_total",
                "Failed block write attempts"
            ),
            registry
        )
        .expect("failed to register write_failures counter");

        let blocks_dropped = register_int_counter_with_registry!(
            Opts::new(
                "ledgerline_blocks_dropped_total",
                "Blocks dropped after exhausting write retries"
            ),
            registry
        )
        .expect("failed to register blocks_dropped counter");

        // Gauges
        let pending_envelopes = register_int_gauge_with_registry!(
            Opts::new(
                "ledgerline_pending_envelopes",
                "Envelopes waiting in the batch cutter"
            ),
            registry
        )
        .expect("failed to register pending_envelopes gauge");

        let ledger_height = register_int_gauge_with_registry!(
            Opts::new("ledgerline_ledger_height", "Number of blocks in the ledger"),
            registry
        )
        .expect("failed to register ledger_height gauge");

        let config_sequence = register_int_gauge_with_registry!(
            Opts::new(
                "ledgerline_config_sequence",
                "Current configuration sequence"
            ),
            registry
        )
        .expect("failed to register config_sequence gauge");

        // Histograms: exponential buckets from 0.1 ms to about 1.6 s.
        let block_write_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "ledgerline_block_write_time_ms",
                "Block append time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.1, 2.0, 15).unwrap()),
            registry
        )
        .expect("failed to register block_write_time_ms histogram");

        Self {
            registry,
            envelopes_received,
            envelopes_rejected,
            envelopes_discarded,
            batches_cut,
            blocks_written,
            config_blocks_written,
            write_failures,
            blocks_dropped,
            pending_envelopes,
            ledger_height,
            config_sequence,
            block_write_time_ms,
        }
    }

    pub fn record_cut(&self, reason: CutReason) {
        self.batches_cut.with_label_values(&[reason.as_str()]).inc();
    }

    /// Encode every metric in the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for OrdererMetrics {
    fn default() -> Self {
        Self::new()
    }
}
