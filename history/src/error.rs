use thiserror::Error;

use ledgerline_store::StoreError;
use ledgerline_types::TypesError;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("corrupt savepoint: {0}")]
    Savepoint(#[from] TypesError),

    #[error("malformed history key: {0}")]
    MalformedKey(String),
}
