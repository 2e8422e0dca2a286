//! Blake2b hashing for block headers and block data.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ledgerline_types::{BlockHash, BlockHeader, Envelope, HeaderType};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash a block header's canonical bytes to produce the block's identity.
pub fn hash_header(header: &BlockHeader) -> BlockHash {
    BlockHash::new(blake2b_256(&header.canonical_bytes()))
}

/// Hash the ordered envelopes of a block.
///
/// Every variable-length field is length-prefixed so that moving bytes
/// between adjacent fields or envelopes always changes the digest.
pub fn hash_block_data(envelopes: &[Envelope]) -> BlockHash {
    let mut hasher = Blake2b256::new();
    hasher.update((envelopes.len() as u64).to_be_bytes());
    for env in envelopes {
        hasher.update([header_type_tag(env.header.header_type)]);
        update_prefixed(&mut hasher, env.header.channel_id.as_bytes());
        update_prefixed(&mut hasher, env.header.tx_id.as_bytes());
        hasher.update(env.header.timestamp.as_secs().to_be_bytes());
        update_prefixed(&mut hasher, &env.payload);
        update_prefixed(&mut hasher, &env.signature);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    BlockHash::new(output)
}

fn update_prefixed(hasher: &mut Blake2b256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn header_type_tag(t: HeaderType) -> u8 {
    match t {
        HeaderType::Message => 0,
        HeaderType::Config => 1,
        HeaderType::ConfigUpdate => 2,
        HeaderType::EndorserTransaction => 3,
        HeaderType::ConsenterTransaction => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(payload: &[u8]) -> Envelope {
        Envelope::new(HeaderType::Message, "ch", payload.to_vec())
    }

    #[test]
    fn blake2b_deterministic() {
        let h1 = blake2b_256(b"hello ledger");
        let h2 = blake2b_256(b"hello ledger");
        assert_eq!(h1, h2);
    }

    #[test]
    fn header_hash_depends_on_every_field() {
        let base = BlockHeader {
            number: 1,
            previous_hash: BlockHash::ZERO,
            data_hash: BlockHash::ZERO,
        };
        let mut other = base.clone();
        other.number = 2;
        assert_ne!(hash_header(&base), hash_header(&other));

        let mut other = base.clone();
        other.previous_hash = BlockHash::new([1u8; 32]);
        assert_ne!(hash_header(&base), hash_header(&other));
    }

    #[test]
    fn data_hash_is_order_sensitive() {
        let a = env(b"a");
        let b = env(b"b");
        assert_ne!(
            hash_block_data(&[a.clone(), b.clone()]),
            hash_block_data(&[b, a])
        );
    }

    #[test]
    fn data_hash_separates_field_boundaries() {
        let joined = env(b"ab");
        let mut split = env(b"a");
        split.signature = b"b".to_vec();
        split.header.timestamp = joined.header.timestamp;
        assert_ne!(hash_block_data(&[joined]), hash_block_data(&[split]));
    }

    #[test]
    fn empty_data_hash_is_stable() {
        assert_eq!(hash_block_data(&[]), hash_block_data(&[]));
        assert!(!hash_block_data(&[]).is_zero());
    }
}
