//! Accumulates normal envelopes into batches under size and time limits.
//!
//! Rules for each incoming envelope, in order:
//!
//! 1. Larger than `preferred_max_bytes`: cut whatever is pending, then
//!    emit the envelope alone.
//! 2. Would push the pending bytes past `preferred_max_bytes`: cut the
//!    pending batch first.
//! 3. Append; if the batch now holds `max_message_count` envelopes or
//!    exactly `preferred_max_bytes` bytes, cut it.
//!
//! The timer starts when the accumulator goes from empty to non-empty and
//! stops on every cut. It is never restarted by later envelopes.

use std::time::Duration;

use tokio::time::Instant;

use ledgerline_types::Envelope;

use crate::config::BatchSize;
use crate::metrics::CutReason;

pub type Batch = Vec<Envelope>;

pub struct BatchCutter {
    batch_size: BatchSize,
    batch_timeout: Duration,
    pending: Batch,
    pending_bytes: u64,
    deadline: Option<Instant>,
}

impl BatchCutter {
    pub fn new(batch_size: BatchSize, batch_timeout: Duration) -> Self {
        Self {
            batch_size,
            batch_timeout,
            pending: Vec::new(),
            pending_bytes: 0,
            deadline: None,
        }
    }

    /// Adopt new limits. A running timer keeps its deadline.
    pub fn set_limits(&mut self, batch_size: BatchSize, batch_timeout: Duration) {
        self.batch_size = batch_size;
        self.batch_timeout = batch_timeout;
    }

    pub fn batch_size(&self) -> BatchSize {
        self.batch_size
    }

    pub fn batch_timeout(&self) -> Duration {
        self.batch_timeout
    }

    /// Feed one envelope. Returns the batches cut as a result, oldest first,
    /// and whether envelopes remain pending afterwards.
    pub fn ordered(&mut self, envelope: Envelope, now: Instant) -> (Vec<(Batch, CutReason)>, bool) {
        let size = envelope.encoded_len();
        let preferred = self.batch_size.preferred_max_bytes;
        let mut batches = Vec::new();

        if size > preferred {
            tracing::warn!(
                size,
                preferred_max_bytes = preferred,
                "envelope larger than preferred batch size, cutting it into its own batch"
            );
            if !self.pending.is_empty() {
                batches.push((self.cut(), CutReason::Overflow));
            }
            batches.push((vec![envelope], CutReason::Oversized));
            return (batches, false);
        }

        if self.pending_bytes + size > preferred {
            tracing::debug!(
                pending = self.pending.len(),
                pending_bytes = self.pending_bytes,
                size,
                "envelope would overflow preferred batch size, cutting pending batch"
            );
            batches.push((self.cut(), CutReason::Overflow));
        }

        if self.pending.is_empty() {
            self.deadline = Some(now + self.batch_timeout);
        }
        self.pending.push(envelope);
        self.pending_bytes += size;

        if self.pending.len() >= self.batch_size.max_message_count as usize
            || self.pending_bytes == preferred
        {
            batches.push((self.cut(), CutReason::Size));
        }

        (batches, !self.pending.is_empty())
    }

    /// Cut the pending batch if the timer has expired at `now`.
    pub fn expire(&mut self, now: Instant) -> Option<Batch> {
        match self.deadline {
            Some(deadline) if deadline <= now => {}
            _ => return None,
        }
        if self.pending.is_empty() {
            tracing::warn!("batch timer expired with no pending envelopes");
            self.deadline = None;
            return None;
        }
        tracing::debug!(pending = self.pending.len(), "batch timer expired, cutting batch");
        Some(self.cut())
    }

    /// Cut everything pending, possibly nothing, and stop the timer.
    pub fn cut(&mut self) -> Batch {
        self.deadline = None;
        self.pending_bytes = 0;
        std::mem::take(&mut self.pending)
    }

    /// When the running timer fires, if one is running.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_bytes(&self) -> u64 {
        self.pending_bytes
    }
}
