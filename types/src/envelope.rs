//! Envelopes: the opaque signed messages submitted for ordering.

use serde::{Deserialize, Serialize};

use crate::rwset::TransactionAction;
use crate::time::Timestamp;
use crate::TypesError;

/// The kind of message an envelope carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderType {
    /// Opaque application message.
    Message,
    /// Full channel configuration.
    Config,
    /// Request to change the channel configuration.
    ConfigUpdate,
    /// Endorsed (simulated) transaction carrying a write set.
    EndorserTransaction,
    /// Transaction produced by the ordering service itself.
    ConsenterTransaction,
}

impl HeaderType {
    /// Whether envelopes of this type travel the configuration track.
    pub fn is_config(&self) -> bool {
        matches!(self, HeaderType::Config | HeaderType::ConfigUpdate)
    }
}

/// Channel header of an envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    pub header_type: HeaderType,
    pub channel_id: String,
    /// Client-chosen transaction id (may be empty for non-endorser messages).
    pub tx_id: String,
    pub timestamp: Timestamp,
}

/// A submitted, signed message. Immutable once submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: EnvelopeHeader,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Envelope {
    /// Build an unsigned envelope stamped with the current time.
    pub fn new(header_type: HeaderType, channel_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            header: EnvelopeHeader {
                header_type,
                channel_id: channel_id.into(),
                tx_id: String::new(),
                timestamp: Timestamp::now(),
            },
            payload,
            signature: Vec::new(),
        }
    }

    /// Build an endorser transaction envelope from a transaction action.
    pub fn endorser_transaction(
        channel_id: impl Into<String>,
        tx_id: impl Into<String>,
        action: &TransactionAction,
    ) -> Result<Self, TypesError> {
        let mut env = Self::new(HeaderType::EndorserTransaction, channel_id, action.to_bytes()?);
        env.header.tx_id = tx_id.into();
        Ok(env)
    }

    pub fn with_tx_id(mut self, tx_id: impl Into<String>) -> Self {
        self.header.tx_id = tx_id.into();
        self
    }

    pub fn header_type(&self) -> HeaderType {
        self.header.header_type
    }

    pub fn is_config(&self) -> bool {
        self.header.header_type.is_config()
    }

    /// Serialized size in bytes, the quantity batch size limits are measured in.
    pub fn encoded_len(&self) -> u64 {
        bincode::serialized_size(self).unwrap_or(u64::MAX)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TypesError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Decode the transaction action carried by an endorser transaction.
    pub fn transaction_action(&self) -> Result<TransactionAction, TypesError> {
        if self.payload.is_empty() {
            return Err(TypesError::EmptyPayload);
        }
        TransactionAction::from_bytes(&self.payload)
    }
}
