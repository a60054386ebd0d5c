use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use rift_types::OwnerId;

use crate::entry::PlayerLedger;
use crate::error::{LedgerError, LedgerResult};
use crate::traits::LedgerBackend;

/// In-memory ledger backend for tests and embedding.
///
/// Records live in a `HashMap` behind a `RwLock`. Individual owners can be
/// made to fail on save or load, to exercise persistence-failure handling.
#[derive(Debug, Default)]
pub struct InMemoryLedgerBackend {
    records: RwLock<HashMap<OwnerId, PlayerLedger>>,
    failing: Mutex<HashSet<OwnerId>>,
    saves: Mutex<HashMap<OwnerId, usize>>,
}

impl InMemoryLedgerBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every load and save for `owner` fail (or succeed again).
    pub fn set_failing(&self, owner: OwnerId, failing: bool) {
        let mut set = self.failing.lock().expect("lock poisoned");
        if failing {
            set.insert(owner);
        } else {
            set.remove(&owner);
        }
    }

    /// Number of successful saves recorded for `owner`.
    pub fn save_count(&self, owner: &OwnerId) -> usize {
        self.saves
            .lock()
            .expect("lock poisoned")
            .get(owner)
            .copied()
            .unwrap_or(0)
    }

    /// The persisted record for `owner`, bypassing any cache.
    pub fn stored(&self, owner: &OwnerId) -> Option<PlayerLedger> {
        self.records.read().expect("lock poisoned").get(owner).cloned()
    }

    fn check(&self, owner: &OwnerId) -> LedgerResult<()> {
        if self.failing.lock().expect("lock poisoned").contains(owner) {
            return Err(LedgerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("simulated ledger failure for {owner}"),
            )));
        }
        Ok(())
    }
}

impl LedgerBackend for InMemoryLedgerBackend {
    fn load(&self, owner: &OwnerId) -> LedgerResult<Option<PlayerLedger>> {
        self.check(owner)?;
        Ok(self.stored(owner))
    }

    fn save(&self, ledger: &PlayerLedger) -> LedgerResult<()> {
        self.check(&ledger.owner())?;
        self.records
            .write()
            .expect("lock poisoned")
            .insert(ledger.owner(), ledger.clone());
        *self
            .saves
            .lock()
            .expect("lock poisoned")
            .entry(ledger.owner())
            .or_default() += 1;
        Ok(())
    }

    fn owners(&self) -> LedgerResult<BTreeSet<OwnerId>> {
        Ok(self.records.read().expect("lock poisoned").keys().copied().collect())
    }
}
