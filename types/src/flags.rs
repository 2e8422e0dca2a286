//! Per-transaction validation flags carried in block metadata.

use serde::{Deserialize, Serialize};

/// Validation outcome of a single transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxValidationCode {
    Valid = 0,
    NilEnvelope = 1,
    BadPayload = 2,
    BadSignature = 3,
    MvccReadConflict = 4,
    EndorsementPolicyFailure = 5,
    InvalidOther = 255,
}

impl TxValidationCode {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::Valid,
            1 => Self::NilEnvelope,
            2 => Self::BadPayload,
            3 => Self::BadSignature,
            4 => Self::MvccReadConflict,
            5 => Self::EndorsementPolicyFailure,
            _ => Self::InvalidOther,
        }
    }
}

/// One byte per transaction in a block, indexed by transaction number.
///
/// An empty filter means "not yet validated" and is interpreted as all-valid.
/// Indices past the end of a non-empty filter are likewise treated as valid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFlags(Vec<u8>);

impl ValidationFlags {
    /// A filter of `len` transactions, all marked valid.
    pub fn all_valid(len: usize) -> Self {
        Self(vec![TxValidationCode::Valid as u8; len])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn set(&mut self, tx_num: usize, code: TxValidationCode) {
        if tx_num >= self.0.len() {
            self.0.resize(tx_num + 1, TxValidationCode::Valid as u8);
        }
        self.0[tx_num] = code as u8;
    }

    pub fn code(&self, tx_num: usize) -> TxValidationCode {
        self.0
            .get(tx_num)
            .map(|b| TxValidationCode::from_byte(*b))
            .unwrap_or(TxValidationCode::Valid)
    }

    pub fn is_valid(&self, tx_num: usize) -> bool {
        self.code(tx_num) == TxValidationCode::Valid
    }

    pub fn is_invalid(&self, tx_num: usize) -> bool {
        !self.is_valid(tx_num)
    }
}
