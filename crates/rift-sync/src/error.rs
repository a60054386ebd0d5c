use thiserror::Error;

use rift_types::OwnerId;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no sync session for {0}")]
    NoSession(OwnerId),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

pub type SyncResult<T> = Result<T, SyncError>;
