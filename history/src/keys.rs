//! Composite history keys.
//!
//! Layout: `namespace ++ 0x00 ++ key ++ 0x00 ++ block_be(8) ++ tx_be(4)`.
//! Big-endian numbers make a prefix scan over `(namespace, key)` return
//! entries in ascending commit order.

use ledgerline_types::Height;

use crate::HistoryError;

/// Reserved key holding the serialized savepoint.
pub const SAVEPOINT_KEY: &[u8] = &[0x00];

const SEPARATOR: u8 = 0x00;
const POSITION_LEN: usize = 12;

/// Prefix shared by every history entry of `(namespace, key)`.
pub fn key_prefix(namespace: &str, key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(namespace.len() + key.len() + 2 + POSITION_LEN);
    out.extend_from_slice(namespace.as_bytes());
    out.push(SEPARATOR);
    out.extend_from_slice(key.as_bytes());
    out.push(SEPARATOR);
    out
}

/// Build the index entry recording a write to `(namespace, key)` by
/// transaction `tx_num` of block `block_num`.
pub fn composite_history_key(namespace: &str, key: &str, block_num: u64, tx_num: u32) -> Vec<u8> {
    let mut out = key_prefix(namespace, key);
    out.extend_from_slice(&Height::new(block_num, tx_num).to_bytes());
    out
}

/// Recover the `(block, tx)` position from the tail of a composite key.
pub fn decode_history_key(composite: &[u8]) -> Result<Height, HistoryError> {
    if composite.len() < POSITION_LEN + 2 {
        return Err(HistoryError::MalformedKey(format!(
            "{} bytes is shorter than the minimum key",
            composite.len()
        )));
    }
    let tail = &composite[composite.len() - POSITION_LEN..];
    Height::from_bytes(tail).map_err(|e| HistoryError::MalformedKey(e.to_string()))
}
