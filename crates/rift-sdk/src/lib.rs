//! High-level engine for the Rift vault.
//!
//! [`RiftEngine`] is the entry point for a server embedding the vault. It
//! ties the template index, per-owner ledgers, delegation graph, and sync
//! sessions together behind the operations a game server calls: insert,
//! take, bind and unbind sharing objects, open and close views, migrate
//! legacy inventories, and rebuild reference counts.

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod migrate;
pub mod rebuild;

pub use batch::{InsertBuffer, PendingInsert, RefillThrottle};
pub use config::EngineConfig;
pub use engine::{Backends, RiftEngine};
pub use error::{EngineError, EngineResult};
pub use rebuild::{IntegrityReport, RebuildReport, Violation, ViolationKind};

// Re-export key types
pub use rift_ledger::{LegacyInventory, PlayerLedger};
pub use rift_merge::{DelegationEdge, MergedView, ViewPlan};
pub use rift_sync::{BroadcastSink, NullSink, SyncEntry, SyncPayload, SyncSink};
pub use rift_types::{BindingId, ItemStack, ItemVariant, OwnerId, Tag, TemplateHash, Timestamp};
