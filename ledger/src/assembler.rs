//! Block assembly: packages a batch of envelopes into a linked block.

use ledgerline_crypto::{hash_block_data, hash_header};
use ledgerline_types::{Block, BlockHash, BlockHeader, BlockMetadata, Envelope, ValidationFlags};

/// Build block `number` on top of `previous_hash` from an ordered batch.
///
/// Every transaction is marked valid; validation happens upstream of
/// ordering, so the assembler never judges envelopes.
pub fn assemble_block(number: u64, previous_hash: BlockHash, envelopes: Vec<Envelope>) -> Block {
    let data_hash = hash_block_data(&envelopes);
    let metadata = BlockMetadata {
        transactions_filter: ValidationFlags::all_valid(envelopes.len()),
        ..Default::default()
    };
    Block {
        header: BlockHeader {
            number,
            previous_hash,
            data_hash,
        },
        data: envelopes,
        metadata,
    }
}

/// The identity of a block: the hash of its header.
pub fn block_hash(block: &Block) -> BlockHash {
    hash_header(&block.header)
}
