use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("unexpected block number: expected {expected}, got {actual}")]
    UnexpectedNumber { expected: u64, actual: u64 },

    #[error("block {number} does not link to the previous block hash")]
    PreviousHashMismatch { number: u64 },

    #[error("block {number} data hash does not match its contents")]
    DataHashMismatch { number: u64 },

    #[error("block {0} is missing from the store")]
    MissingBlock(u64),

    #[error("storage error: {0}")]
    Storage(#[from] ledgerline_store::StoreError),

    #[error("history error: {0}")]
    History(#[from] ledgerline_history::HistoryError),

    #[error("encoding error: {0}")]
    Encoding(#[from] ledgerline_types::TypesError),
}
