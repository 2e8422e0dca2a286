use thiserror::Error;

use ledgerline_types::HeaderType;

/// Why a message was refused admission. Always "discard and continue":
/// the message is logged and dropped, the pipeline carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("envelope has an empty payload")]
    EmptyPayload,

    #[error("envelope for channel '{actual}' submitted to channel '{expected}'")]
    WrongChannel { expected: String, actual: String },

    #[error("envelope of {size} bytes exceeds the absolute maximum of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("{0:?} is not a configuration message")]
    NotConfig(HeaderType),

    #[error("{0:?} is a configuration message, not a normal message")]
    NotNormal(HeaderType),

    #[error("invalid configuration update: {0}")]
    InvalidConfigUpdate(String),
}

#[derive(Debug, Error)]
pub enum OrdererError {
    #[error("ledger error: {0}")]
    Ledger(#[from] ledgerline_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] ledgerline_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] ledgerline_store_lmdb::LmdbError),

    #[error("block {0} is not a configuration block")]
    InvalidConfigBlock(u64),

    #[error("configuration block {number} could not be applied: {source}")]
    ConfigApply { number: u64, source: ProcessError },

    #[error("config error: {0}")]
    Config(String),

    #[error("envelope rejected: {0}")]
    Rejected(#[from] ProcessError),

    #[error("submission queue is full")]
    QueueFull,

    #[error("chain is not started")]
    NotStarted,

    #[error("chain is already started")]
    AlreadyStarted,

    #[error("chain has been halted")]
    Halted,

    #[error("no tokio runtime to start the chain on")]
    NoRuntime,

    #[error("consumer task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrdererError {
    /// Whether retrying the same block may succeed: only ledger append
    /// failures leave the writer's block counter untouched.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrdererError::Ledger(_))
    }
}
