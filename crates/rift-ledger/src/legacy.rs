//! The legacy slot-based inventory format.
//!
//! Before template deduplication each owner's store was a flat list of item
//! stacks, one per slot. Migration reads that list, credits the owner's
//! ledger, and clears it. Only reading and clearing are supported.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use rift_types::{ItemStack, OwnerId};

use crate::error::{LedgerError, LedgerResult};

/// Directory (under the data directory) holding legacy inventories.
pub const LEGACY_DIR: &str = "legacy";

/// One owner's legacy inventory: a list of optional item stacks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyInventory {
    pub slots: Vec<Option<ItemStack>>,
}

impl LegacyInventory {
    pub fn new(slots: Vec<Option<ItemStack>>) -> Self {
        Self { slots }
    }

    /// `true` if every slot is absent or holds an empty stack.
    pub fn is_empty(&self) -> bool {
        self.stacks().next().is_none()
    }

    /// The non-empty stacks, in slot order.
    pub fn stacks(&self) -> impl Iterator<Item = &ItemStack> {
        self.slots.iter().flatten().filter(|s| !s.is_empty())
    }
}

/// Source of legacy inventories.
pub trait LegacyStore: Send + Sync {
    /// Read `owner`'s legacy inventory. Owners with none read as empty.
    fn load(&self, owner: &OwnerId) -> LedgerResult<LegacyInventory>;

    /// Empty `owner`'s legacy inventory once its contents are migrated.
    fn clear(&self, owner: &OwnerId) -> LedgerResult<()>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-memory legacy store, for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryLegacyStore {
    inventories: RwLock<HashMap<OwnerId, LegacyInventory>>,
    fail_clear: Mutex<HashSet<OwnerId>>,
}

impl InMemoryLegacyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an owner's legacy inventory.
    pub fn insert(&self, owner: OwnerId, inventory: LegacyInventory) {
        self.inventories
            .write()
            .expect("lock poisoned")
            .insert(owner, inventory);
    }

    /// Make `clear` fail for `owner` (or succeed again).
    pub fn set_fail_clear(&self, owner: OwnerId, failing: bool) {
        let mut set = self.fail_clear.lock().expect("lock poisoned");
        if failing {
            set.insert(owner);
        } else {
            set.remove(&owner);
        }
    }
}

impl LegacyStore for InMemoryLegacyStore {
    fn load(&self, owner: &OwnerId) -> LedgerResult<LegacyInventory> {
        Ok(self
            .inventories
            .read()
            .expect("lock poisoned")
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    fn clear(&self, owner: &OwnerId) -> LedgerResult<()> {
        if self.fail_clear.lock().expect("lock poisoned").contains(owner) {
            return Err(LedgerError::Legacy {
                owner: *owner,
                reason: "simulated clear failure".into(),
            });
        }
        self.inventories.write().expect("lock poisoned").remove(owner);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// Legacy store reading `legacy/<owner-uuid>.json` files.
///
/// Clearing removes the owner's file.
#[derive(Debug)]
pub struct FileLegacyStore {
    dir: PathBuf,
}

impl FileLegacyStore {
    /// Read legacy inventories from `<data_dir>/legacy`.
    pub fn open(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join(LEGACY_DIR),
        }
    }

    pub fn path_for(&self, owner: &OwnerId) -> PathBuf {
        self.dir.join(format!("{owner}.json"))
    }

    /// Write an owner's legacy inventory. Used to stage fixtures and imports.
    pub fn write(&self, owner: &OwnerId, inventory: &LegacyInventory) -> LedgerResult<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec_pretty(inventory)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        fs::write(self.path_for(owner), json)?;
        Ok(())
    }
}

impl LegacyStore for FileLegacyStore {
    fn load(&self, owner: &OwnerId) -> LedgerResult<LegacyInventory> {
        let bytes = match fs::read(self.path_for(owner)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LegacyInventory::default()),
            Err(e) => return Err(e.into()),
        };
        let inventory: LegacyInventory =
            serde_json::from_slice(&bytes).map_err(|e| LedgerError::Legacy {
                owner: *owner,
                reason: e.to_string(),
            })?;
        debug!(owner = %owner, slots = inventory.slots.len(), "legacy inventory read");
        Ok(inventory)
    }

    fn clear(&self, owner: &OwnerId) -> LedgerResult<()> {
        match fs::remove_file(self.path_for(owner)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
