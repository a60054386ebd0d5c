//! Client synchronization for the Rift vault.
//!
//! Every viewer that opens their store gets a sync session: a session id
//! plus a strictly increasing sequence number stamped on each payload, so a
//! client can discard stale or reordered updates. Changes made while a
//! viewer is not looking are remembered as pending and folded into the
//! next full snapshot.
//!
//! Payload delivery goes through the [`SyncSink`] trait; [`BroadcastSink`]
//! fans payloads out over `tokio::sync::broadcast` channels.

pub mod error;
pub mod payload;
pub mod session;
pub mod sink;

pub use error::{SyncError, SyncResult};
pub use payload::{SyncEntry, SyncPayload};
pub use session::{Delivery, SessionManager, SyncSession};
pub use sink::{BroadcastSink, NullSink, PayloadStream, SyncSink};
