//! Error types for the index crate.

use rift_types::TemplateHash;

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The hash does not resolve to a template.
    #[error("unknown template: {0:?}")]
    UnknownTemplate(TemplateHash),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] rift_store::StoreError),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
