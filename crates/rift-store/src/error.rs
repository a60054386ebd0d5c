use std::path::PathBuf;

/// Errors from template store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The record is malformed: wrong magic, bad length, or CRC mismatch.
    #[error("corrupt record: {reason}")]
    Corrupt { reason: String },

    /// The record was written by an unsupported format version.
    #[error("unsupported record format {found} (expected {expected})")]
    UnsupportedFormat { expected: u32, found: u32 },

    /// Atomic replacement of a record file failed.
    #[error("failed to persist {path}: {reason}")]
    Persist { path: PathBuf, reason: String },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
