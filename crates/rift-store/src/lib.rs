//! Template storage for the Rift vault.
//!
//! A *template* is the canonical record of one distinct item variant,
//! shared by every owner holding that variant. This crate defines the
//! [`Template`] record and the [`TemplateStore`] trait that persists the
//! whole template directory as one durable global record.
//!
//! # Storage Backends
//!
//! - [`InMemoryTemplateStore`] -- holds the directory in memory, for tests
//!   and embedding
//! - [`FileTemplateStore`] -- a single framed record file (`templates.db`)
//!
//! # Record Format
//!
//! Every durable record written by the vault (the template directory here,
//! per-owner ledgers in `rift-ledger`) uses the [`codec`] framing:
//! a magic tag, a length, and a CRC32 over a bincode payload. Files are
//! replaced atomically through a temporary file in the same directory.
//!
//! # Design Rules
//!
//! 1. The store never interprets reference counts; it persists what the
//!    index hands it.
//! 2. A missing record loads as empty; a damaged record is an error.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod codec;
pub mod error;
pub mod file;
pub mod memory;
pub mod template;
pub mod traits;

pub use codec::{decode_framed, encode_framed, write_atomic, RecordMagic};
pub use error::{StoreError, StoreResult};
pub use file::FileTemplateStore;
pub use memory::InMemoryTemplateStore;
pub use template::{Template, TemplateDirectory};
pub use traits::TemplateStore;
