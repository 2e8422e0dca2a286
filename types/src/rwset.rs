//! Read-write sets produced by transaction simulation.
//!
//! An endorser transaction's payload is a bincode-encoded [`TransactionAction`]
//! whose `results` field is itself a bincode-encoded [`TxRwSet`].

use serde::{Deserialize, Serialize};

use crate::TypesError;

/// Status code of a successful simulation response.
pub const STATUS_OK: i32 = 200;

/// A single key written by a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvWrite {
    pub key: String,
    pub value: Vec<u8>,
    pub is_delete: bool,
}

/// Reads and writes of one transaction within one namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsRwSet {
    pub namespace: String,
    pub reads: Vec<String>,
    pub writes: Vec<KvWrite>,
}

impl NsRwSet {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn write(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.writes.push(KvWrite {
            key: key.into(),
            value: value.into(),
            is_delete: false,
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.writes.push(KvWrite {
            key: key.into(),
            value: Vec::new(),
            is_delete: true,
        });
        self
    }
}

/// The complete read-write set of a transaction, grouped by namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRwSet {
    pub ns_rw_sets: Vec<NsRwSet>,
}

impl TxRwSet {
    pub fn new(ns_rw_sets: Vec<NsRwSet>) -> Self {
        Self { ns_rw_sets }
    }

    /// Iterate over every `(namespace, write)` pair in declaration order.
    pub fn writes(&self) -> impl Iterator<Item = (&str, &KvWrite)> {
        self.ns_rw_sets
            .iter()
            .flat_map(|ns| ns.writes.iter().map(move |w| (ns.namespace.as_str(), w)))
    }
}

/// The simulated action recorded in an endorser transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAction {
    pub response_status: i32,
    /// Encoded [`TxRwSet`]; empty when the simulation produced no response.
    pub results: Vec<u8>,
}

impl TransactionAction {
    /// Wrap a write set in a successful action.
    pub fn new(rwset: &TxRwSet) -> Result<Self, TypesError> {
        Ok(Self {
            response_status: STATUS_OK,
            results: bincode::serialize(rwset)?,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TypesError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Whether the action carries a successful simulation response.
    pub fn has_response(&self) -> bool {
        self.response_status == STATUS_OK && !self.results.is_empty()
    }

    /// Decode the write set, failing when there is no successful response.
    pub fn rwset(&self) -> Result<TxRwSet, TypesError> {
        if !self.has_response() {
            return Err(TypesError::NoResponse);
        }
        Ok(bincode::deserialize(&self.results)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_flattened_in_order() {
        let rwset = TxRwSet::new(vec![
            NsRwSet::new("assets").write("a", b"1".to_vec()).write("b", b"2".to_vec()),
            NsRwSet::new("owners").delete("a"),
        ]);
        let writes: Vec<(&str, &str, bool)> = rwset
            .writes()
            .map(|(ns, w)| (ns, w.key.as_str(), w.is_delete))
            .collect();
        assert_eq!(
            writes,
            vec![("assets", "a", false), ("assets", "b", false), ("owners", "a", true)]
        );
    }

    #[test]
    fn action_round_trips_its_rwset() {
        let rwset = TxRwSet::new(vec![NsRwSet::new("ns").write("k", b"v".to_vec())]);
        let action = TransactionAction::new(&rwset).unwrap();
        let decoded = TransactionAction::from_bytes(&action.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.rwset().unwrap(), rwset);
    }

    #[test]
    fn failed_response_has_no_rwset() {
        let action = TransactionAction {
            response_status: 500,
            results: vec![1, 2, 3],
        };
        assert!(!action.has_response());
        assert!(matches!(action.rwset(), Err(TypesError::NoResponse)));
    }

    #[test]
    fn empty_results_have_no_rwset() {
        let action = TransactionAction {
            response_status: STATUS_OK,
            results: Vec::new(),
        };
        assert!(matches!(action.rwset(), Err(TypesError::NoResponse)));
    }
}
