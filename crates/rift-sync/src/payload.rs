use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rift_types::{ItemVariant, OwnerId, TemplateHash, Timestamp};

use crate::error::{SyncError, SyncResult};

/// One visible template in a sync payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntry {
    pub hash: TemplateHash,
    pub variant: ItemVariant,
    pub count: u64,
    pub stored_at: Timestamp,
}

/// A full snapshot of a viewer's merged view, stamped with the viewer's
/// session id and a sequence number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub viewer: OwnerId,
    pub session_id: Uuid,
    pub seq: u64,
    pub entries: Vec<SyncEntry>,
}

impl SyncPayload {
    /// Total units across all entries.
    pub fn total_units(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// The entry for `hash`, if visible.
    pub fn entry(&self, hash: &TemplateHash) -> Option<&SyncEntry> {
        self.entries.iter().find(|e| e.hash == *hash)
    }

    /// Bincode wire form.
    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SyncError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> SyncResult<Self> {
        bincode::deserialize(bytes).map_err(|e| SyncError::Serialization(e.to_string()))
    }
}
