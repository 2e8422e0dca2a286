//! Channel configuration resources: the sequence and batching parameters
//! in effect, and how configuration envelopes change them.

use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ledgerline_types::Envelope;

use crate::config::{BatchSize, OrdererConfig};
use crate::ProcessError;

/// Read access to the current channel configuration, plus the single
/// mutation a configuration block performs.
pub trait ConfigResources: Send + Sync {
    fn channel_id(&self) -> &str;

    /// Configuration sequence; bumped by every applied configuration block.
    fn sequence(&self) -> u64;

    fn batch_timeout(&self) -> Duration;

    fn batch_size(&self) -> BatchSize;

    /// Check that `envelope` would apply, without changing anything.
    fn validate_config(&self, envelope: &Envelope) -> Result<(), ProcessError>;

    /// Apply a configuration envelope, returning the new sequence.
    fn apply_config(&self, envelope: &Envelope) -> Result<u64, ProcessError>;
}

/// Payload of a configuration envelope (JSON). Absent fields keep their
/// current value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsenterConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<BatchSize>,
}

impl ConsenterConfigUpdate {
    /// Decode and validate an update payload.
    pub fn decode(payload: &[u8]) -> Result<Self, ProcessError> {
        let update: Self = serde_json::from_slice(payload)
            .map_err(|e| ProcessError::InvalidConfigUpdate(e.to_string()))?;
        if update.batch_timeout_ms == Some(0) {
            return Err(ProcessError::InvalidConfigUpdate(
                "batch_timeout_ms must be greater than zero".into(),
            ));
        }
        if let Some(size) = &update.batch_size {
            size.validate().map_err(ProcessError::InvalidConfigUpdate)?;
        }
        Ok(update)
    }

    pub fn to_payload(&self) -> Vec<u8> {
        // Plain data with no maps keyed by non-strings always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug)]
struct ChannelState {
    sequence: u64,
    batch_timeout: Duration,
    batch_size: BatchSize,
}

/// In-memory [`ConfigResources`] for one channel.
pub struct ChannelResources {
    channel_id: String,
    state: RwLock<ChannelState>,
}

impl ChannelResources {
    pub fn new(channel_id: impl Into<String>, batch_timeout: Duration, batch_size: BatchSize) -> Self {
        Self {
            channel_id: channel_id.into(),
            state: RwLock::new(ChannelState {
                sequence: 0,
                batch_timeout,
                batch_size,
            }),
        }
    }

    pub fn from_config(config: &OrdererConfig) -> Self {
        Self::new(
            config.channel_id.clone(),
            config.batch_timeout(),
            config.batch_size,
        )
    }
}

fn decode_config(envelope: &Envelope) -> Result<ConsenterConfigUpdate, ProcessError> {
    if !envelope.is_config() {
        return Err(ProcessError::NotConfig(envelope.header_type()));
    }
    ConsenterConfigUpdate::decode(&envelope.payload)
}

impl ConfigResources for ChannelResources {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn sequence(&self) -> u64 {
        self.state.read().unwrap().sequence
    }

    fn batch_timeout(&self) -> Duration {
        self.state.read().unwrap().batch_timeout
    }

    fn batch_size(&self) -> BatchSize {
        self.state.read().unwrap().batch_size
    }

    fn validate_config(&self, envelope: &Envelope) -> Result<(), ProcessError> {
        decode_config(envelope).map(|_| ())
    }

    fn apply_config(&self, envelope: &Envelope) -> Result<u64, ProcessError> {
        let update = decode_config(envelope)?;

        let mut state = self.state.write().unwrap();
        if let Some(ms) = update.batch_timeout_ms {
            state.batch_timeout = Duration::from_millis(ms);
        }
        if let Some(size) = update.batch_size {
            state.batch_size = size;
        }
        state.sequence += 1;
        tracing::info!(
            channel = %self.channel_id,
            sequence = state.sequence,
            batch_timeout_ms = state.batch_timeout.as_millis() as u64,
            max_message_count = state.batch_size.max_message_count,
            "channel configuration updated"
        );
        Ok(state.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerline_types::HeaderType;

    fn resources() -> ChannelResources {
        ChannelResources::new("ch", Duration::from_millis(100), BatchSize::default())
    }

    fn config_env(update: &ConsenterConfigUpdate) -> Envelope {
        Envelope::new(HeaderType::Config, "ch", update.to_payload())
    }

    #[test]
    fn apply_bumps_sequence_and_updates_fields() {
        let res = resources();
        let update = ConsenterConfigUpdate {
            batch_timeout_ms: Some(500),
            batch_size: Some(BatchSize {
                max_message_count: 3,
                ..BatchSize::default()
            }),
        };
        assert_eq!(res.apply_config(&config_env(&update)).unwrap(), 1);
        assert_eq!(res.sequence(), 1);
        assert_eq!(res.batch_timeout(), Duration::from_millis(500));
        assert_eq!(res.batch_size().max_message_count, 3);
    }

    #[test]
    fn empty_update_still_bumps_sequence() {
        let res = resources();
        res.apply_config(&config_env(&ConsenterConfigUpdate::default()))
            .unwrap();
        res.apply_config(&config_env(&ConsenterConfigUpdate::default()))
            .unwrap();
        assert_eq!(res.sequence(), 2);
        assert_eq!(res.batch_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn normal_envelope_is_not_applied() {
        let res = resources();
        let env = Envelope::new(HeaderType::Message, "ch", b"{}".to_vec());
        assert!(matches!(
            res.apply_config(&env),
            Err(ProcessError::NotConfig(HeaderType::Message))
        ));
        assert_eq!(res.sequence(), 0);
    }

    #[test]
    fn malformed_update_is_rejected_without_side_effects() {
        let res = resources();
        let env = Envelope::new(HeaderType::Config, "ch", b"not json".to_vec());
        assert!(matches!(
            res.apply_config(&env),
            Err(ProcessError::InvalidConfigUpdate(_))
        ));
        assert_eq!(res.sequence(), 0);
    }

    #[test]
    fn validation_has_no_side_effects() {
        let res = resources();
        let good = config_env(&ConsenterConfigUpdate {
            batch_timeout_ms: Some(700),
            batch_size: None,
        });
        res.validate_config(&good).unwrap();
        assert_eq!(res.sequence(), 0);
        assert_eq!(res.batch_timeout(), Duration::from_millis(100));

        let garbled = Envelope::new(HeaderType::Config, "ch", b"{oops".to_vec());
        assert!(matches!(
            res.validate_config(&garbled),
            Err(ProcessError::InvalidConfigUpdate(_))
        ));
        let normal = Envelope::new(HeaderType::Message, "ch", b"{}".to_vec());
        assert!(matches!(
            res.validate_config(&normal),
            Err(ProcessError::NotConfig(HeaderType::Message))
        ));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let err = ConsenterConfigUpdate::decode(br#"{"batch_timeout_ms":0}"#).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidConfigUpdate(_)));
    }
}
