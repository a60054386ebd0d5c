//! Template index for the Rift vault.
//!
//! The index is the in-memory directory of every known template. It
//! answers lookups by hash, creates templates on first sight of a variant,
//! and tracks each template's global reference count: the number of units,
//! summed over every owner's ledger, that point at it.
//!
//! # Key Types
//!
//! - [`TemplateIndex`] -- The directory (BTreeMap-backed), persisted through
//!   a [`rift_store::TemplateStore`]
//! - [`IndexError`] -- Lookup and persistence failures

pub mod error;
pub mod index;

pub use error::{IndexError, IndexResult};
pub use index::TemplateIndex;
