use thiserror::Error;

use rift_types::OwnerId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] rift_store::StoreError),

    #[error("index error: {0}")]
    Index(#[from] rift_index::IndexError),

    #[error("ledger error: {0}")]
    Ledger(#[from] rift_ledger::LedgerError),

    #[error("delegation error: {0}")]
    Merge(#[from] rift_merge::MergeError),

    #[error("sync error: {0}")]
    Sync(#[from] rift_sync::SyncError),

    #[error("hash error: {0}")]
    Hash(#[from] rift_crypto::HasherError),

    #[error("ledgers of {} owner(s) could not be saved", owners.len())]
    Unsaved { owners: Vec<OwnerId> },
}

pub type EngineResult<T> = Result<T, EngineError>;
