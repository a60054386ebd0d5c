//! Foundation types for the Rift vault.
//!
//! This crate provides the identity, item, and temporal types used
//! throughout the vault. Every other Rift crate depends on `rift-types`.
//!
//! # Key Types
//!
//! - [`OwnerId`]: Stable identity of a vault owner (player UUID)
//! - [`BindingId`]: Identity of a bound sharing object
//! - [`ItemVariant`]: Item kind plus every non-quantity attribute
//! - [`ItemStack`]: A variant with a unit count
//! - [`Tag`]: Structured, totally ordered component value
//! - [`HashContext`]: Game-data context a variant is interpreted under
//! - [`TemplateHash`]: Content-addressed identifier of a variant (BLAKE3)
//! - [`Timestamp`]: Wall-clock milliseconds used for ledger ages

pub mod error;
pub mod identity;
pub mod item;
pub mod template;
pub mod temporal;

pub use error::TypeError;
pub use identity::{BindingId, OwnerId};
pub use item::{HashContext, ItemStack, ItemVariant, Tag};
pub use template::TemplateHash;
pub use temporal::Timestamp;
