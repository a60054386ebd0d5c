use rift_types::OwnerId;

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] rift_store::StoreError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("ledger record for {expected} names owner {found}")]
    OwnerMismatch { expected: OwnerId, found: OwnerId },

    #[error("legacy inventory error for {owner}: {reason}")]
    Legacy { owner: OwnerId, reason: String },
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
