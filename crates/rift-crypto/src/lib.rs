//! Hashing for the Rift vault.
//!
//! Template hashes are BLAKE3 digests over a canonical bincode encoding of
//! an item variant, domain separated so that template hashes can never
//! collide with any other digest the vault computes.

pub mod hasher;

pub use hasher::{HasherError, VariantHasher};
