//! Per-owner quantity ledgers for the Rift vault.
//!
//! Each owner's store is a [`PlayerLedger`]: a map from template hash to an
//! owned quantity and a last-touched timestamp. Ledgers never hold item data
//! themselves; the template index owns that.
//!
//! This crate provides:
//! - [`LedgerEntry`] / [`PlayerLedger`] with remove-at-zero semantics
//! - the [`LedgerBackend`] trait boundary, with [`InMemoryLedgerBackend`]
//!   and the one-record-per-owner [`FileLedgerBackend`]
//! - [`LedgerBook`], the lazily loading resident set that batches
//!   write-back
//! - the legacy slot-based inventory format ([`LegacyInventory`],
//!   [`LegacyStore`]) consumed by migration

pub mod book;
pub mod entry;
pub mod error;
pub mod file;
pub mod legacy;
pub mod memory;
pub mod traits;

pub use book::{FlushReport, LedgerBook};
pub use entry::{LedgerEntry, PlayerLedger};
pub use error::{LedgerError, LedgerResult};
pub use file::FileLedgerBackend;
pub use legacy::{FileLegacyStore, InMemoryLegacyStore, LegacyInventory, LegacyStore};
pub use memory::InMemoryLedgerBackend;
pub use traits::LedgerBackend;
