//! Two latest-wins mailboxes, one per track, and the per-cycle decision
//! of which message to handle next.

use std::sync::Mutex;

use ledgerline_types::Envelope;

use crate::processor::MessageProcessor;
use crate::ProcessError;

/// Which track a message travels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Track {
    Normal,
    Config,
}

impl Track {
    pub fn of(envelope: &Envelope) -> Self {
        if envelope.is_config() {
            Track::Config
        } else {
            Track::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Normal => "normal",
            Track::Config => "config",
        }
    }
}

/// An envelope tagged with the configuration sequence it was validated at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMessage {
    pub config_seq: u64,
    pub envelope: Envelope,
}

impl PendingMessage {
    pub fn new(envelope: Envelope, config_seq: u64) -> Self {
        Self { config_seq, envelope }
    }
}

/// A single-message mailbox. A new message replaces an untaken one.
#[derive(Debug, Default)]
pub struct PendingSlot {
    inner: Mutex<Option<PendingMessage>>,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `message`, returning the one it overwrote, if any.
    pub fn put(&self, message: PendingMessage) -> Option<PendingMessage> {
        self.inner.lock().unwrap().replace(message)
    }

    pub fn take(&self) -> Option<PendingMessage> {
        self.inner.lock().unwrap().take()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_none()
    }
}

/// Outcome of one classifier cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cycle {
    /// A configuration envelope, valid under the current sequence.
    Config(Envelope),
    /// A normal envelope, valid under the current sequence.
    Normal(Envelope),
    /// A stale message that failed re-validation.
    Discarded(Track, ProcessError),
    /// Both slots were empty.
    Idle,
}

#[derive(Debug, Default)]
pub struct MessageClassifier {
    normal: PendingSlot,
    config: PendingSlot,
}

impl MessageClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(&self, envelope: Envelope, config_seq: u64) {
        self.place(Track::Normal, PendingMessage::new(envelope, config_seq));
    }

    pub fn configure(&self, envelope: Envelope, config_seq: u64) {
        self.place(Track::Config, PendingMessage::new(envelope, config_seq));
    }

    /// Put a tagged message into the slot for `track`.
    pub fn place(&self, track: Track, message: PendingMessage) {
        let slot = match track {
            Track::Normal => &self.normal,
            Track::Config => &self.config,
        };
        if let Some(old) = slot.put(message) {
            tracing::debug!(
                track = track.as_str(),
                config_seq = old.config_seq,
                "pending message overwritten before it was consumed"
            );
        }
    }

    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.config.is_empty()
    }

    /// Take the next message, config slot first.
    ///
    /// A message tagged with a sequence older than `current_seq` is
    /// re-validated through `processor`; on failure it is discarded.
    pub fn next(&self, current_seq: u64, processor: &dyn MessageProcessor) -> Cycle {
        if let Some(msg) = self.config.take() {
            if msg.config_seq >= current_seq {
                return Cycle::Config(msg.envelope);
            }
            return match processor.process_config_msg(&msg.envelope) {
                Ok((config, _)) => Cycle::Config(config),
                Err(e) => {
                    tracing::warn!(
                        config_seq = msg.config_seq,
                        current_seq,
                        error = %e,
                        "discarding stale config message"
                    );
                    Cycle::Discarded(Track::Config, e)
                }
            };
        }

        if let Some(msg) = self.normal.take() {
            if msg.config_seq >= current_seq {
                return Cycle::Normal(msg.envelope);
            }
            return match processor.process_normal_msg(&msg.envelope) {
                Ok(_) => Cycle::Normal(msg.envelope),
                Err(e) => {
                    tracing::warn!(
                        config_seq = msg.config_seq,
                        current_seq,
                        error = %e,
                        "discarding stale normal message"
                    );
                    Cycle::Discarded(Track::Normal, e)
                }
            };
        }

        Cycle::Idle
    }
}
