//! The resident set of owner ledgers.
//!
//! [`LedgerBook`] loads an owner's ledger the first time it is referenced,
//! applies mutations in memory, and tracks which owners need writing back.
//! Nothing is written until [`LedgerBook::flush_owner`] or
//! [`LedgerBook::flush`]; a failed write leaves the owner dirty so the next
//! flush retries it.
//!
//! An owner whose record cannot be read reads as empty but is marked
//! unreadable: the placeholder refuses mutations and is never written, so
//! the durable record survives until a later load succeeds.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use rift_types::{OwnerId, TemplateHash, Timestamp};

use crate::entry::{LedgerEntry, PlayerLedger};
use crate::error::LedgerResult;
use crate::traits::LedgerBackend;

/// Outcome of a [`LedgerBook::flush`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Owners whose ledgers were written.
    pub written: Vec<OwnerId>,
    /// Owners whose write failed; they remain dirty.
    pub failed: Vec<OwnerId>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Lazily loaded, write-back cache of owner ledgers.
pub struct LedgerBook {
    backend: Arc<dyn LedgerBackend>,
    resident: HashMap<OwnerId, PlayerLedger>,
    dirty: BTreeSet<OwnerId>,
    unreadable: BTreeSet<OwnerId>,
}

impl std::fmt::Debug for LedgerBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerBook")
            .field("resident", &self.resident.len())
            .field("dirty", &self.dirty.len())
            .field("unreadable", &self.unreadable.len())
            .finish()
    }
}

impl LedgerBook {
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self {
            backend,
            resident: HashMap::new(),
            dirty: BTreeSet::new(),
            unreadable: BTreeSet::new(),
        }
    }

    /// The backend this book reads from and writes to.
    pub fn backend(&self) -> &Arc<dyn LedgerBackend> {
        &self.backend
    }

    // ---------------------------------------------------------------
    // Access
    // ---------------------------------------------------------------

    /// The ledger of `owner`, loading it on first reference.
    ///
    /// An owner with no record, or whose record cannot be read, gets an
    /// empty ledger. Load failures are logged, never returned; the owner is
    /// marked unreadable and the load is retried on the next reference.
    pub fn ledger(&mut self, owner: OwnerId) -> &PlayerLedger {
        let loaded = self.try_ledger_mut(owner).map(|_| ());
        if let Err(e) = loaded {
            warn!(owner = %owner, error = %e, "ledger load failed; treating owner as empty");
            self.unreadable.insert(owner);
            self.resident.insert(owner, PlayerLedger::new(owner));
        }
        self.resident
            .entry(owner)
            .or_insert_with(|| PlayerLedger::new(owner))
    }

    /// The ledger of `owner`, failing if its record cannot be read.
    pub fn try_ledger(&mut self, owner: OwnerId) -> LedgerResult<&PlayerLedger> {
        self.try_ledger_mut(owner).map(|ledger| &*ledger)
    }

    fn try_ledger_mut(&mut self, owner: OwnerId) -> LedgerResult<&mut PlayerLedger> {
        if !self.resident.contains_key(&owner) || self.unreadable.contains(&owner) {
            let ledger = self
                .backend
                .load(&owner)?
                .unwrap_or_else(|| PlayerLedger::new(owner));
            if self.unreadable.remove(&owner) {
                debug!(owner = %owner, "ledger readable again");
            }
            self.resident.insert(owner, ledger);
        }
        Ok(self
            .resident
            .entry(owner)
            .or_insert_with(|| PlayerLedger::new(owner)))
    }

    /// Every non-zero entry of `owner`. Unknown owners yield an empty map.
    pub fn read_all(&mut self, owner: OwnerId) -> &BTreeMap<TemplateHash, LedgerEntry> {
        self.ledger(owner).entries()
    }

    /// Units of `template` held by `owner`.
    pub fn count(&mut self, owner: OwnerId, template: &TemplateHash) -> u64 {
        self.ledger(owner).count(template)
    }

    /// A detached copy of `owner`'s ledger.
    pub fn snapshot(&mut self, owner: OwnerId) -> PlayerLedger {
        self.ledger(owner).clone()
    }

    pub fn is_resident(&self, owner: &OwnerId) -> bool {
        self.resident.contains_key(owner)
    }

    pub fn is_dirty(&self, owner: &OwnerId) -> bool {
        self.dirty.contains(owner)
    }

    /// Owners with unsaved changes.
    pub fn dirty_owners(&self) -> impl Iterator<Item = &OwnerId> {
        self.dirty.iter()
    }

    /// Every known owner: those persisted by the backend plus those resident.
    pub fn owners(&self) -> LedgerResult<BTreeSet<OwnerId>> {
        let mut owners = self.backend.owners()?;
        owners.extend(self.resident.keys().copied());
        Ok(owners)
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Apply a signed quantity change to `owner`'s ledger.
    ///
    /// See [`PlayerLedger::add`]. The owner is marked dirty whenever the
    /// ledger actually changes. Fails without touching anything if the
    /// owner's record cannot be read.
    pub fn add(
        &mut self,
        owner: OwnerId,
        template: TemplateHash,
        delta: i64,
        timestamp: Timestamp,
    ) -> LedgerResult<u64> {
        let ledger = self.try_ledger_mut(owner)?;
        let before = ledger.entry(&template).cloned();
        let updated = ledger.add(template, delta, timestamp);
        if ledger.entry(&template) != before.as_ref() {
            self.dirty.insert(owner);
        }
        Ok(updated)
    }

    /// Replace `owner`'s ledger wholesale and mark it dirty.
    pub fn replace(&mut self, ledger: PlayerLedger) {
        let owner = ledger.owner();
        self.unreadable.remove(&owner);
        self.resident.insert(owner, ledger);
        self.dirty.insert(owner);
    }

    // ---------------------------------------------------------------
    // Write-back
    // ---------------------------------------------------------------

    /// Write `owner`'s ledger if it has unsaved changes.
    ///
    /// On failure the owner stays dirty.
    pub fn flush_owner(&mut self, owner: &OwnerId) -> LedgerResult<()> {
        if !self.dirty.contains(owner) {
            return Ok(());
        }
        let Some(ledger) = self.resident.get(owner) else {
            self.dirty.remove(owner);
            return Ok(());
        };
        self.backend.save(ledger)?;
        self.dirty.remove(owner);
        debug!(owner = %owner, entries = ledger.len(), "ledger flushed");
        Ok(())
    }

    /// Write every dirty ledger, logging failures.
    pub fn flush(&mut self) -> FlushReport {
        let mut report = FlushReport::default();
        let pending: Vec<OwnerId> = self.dirty.iter().copied().collect();
        for owner in pending {
            match self.flush_owner(&owner) {
                Ok(()) => report.written.push(owner),
                Err(e) => {
                    warn!(owner = %owner, error = %e, "ledger save failed; will retry");
                    report.failed.push(owner);
                }
            }
        }
        report
    }

    /// Drop every clean ledger whose owner is not in `keep`.
    ///
    /// Dirty ledgers are never dropped, so an unsaved change survives until
    /// a flush succeeds.
    pub fn release(&mut self, keep: &BTreeSet<OwnerId>) {
        let dirty = &self.dirty;
        let before = self.resident.len();
        self.resident
            .retain(|owner, _| keep.contains(owner) || dirty.contains(owner));
        let resident = &self.resident;
        self.unreadable.retain(|owner| resident.contains_key(owner));
        let dropped = before - self.resident.len();
        if dropped > 0 {
            debug!(dropped, resident = self.resident.len(), "released ledgers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLedgerBackend;

    fn hash(name: &str) -> TemplateHash {
        TemplateHash::from_bytes(name.as_bytes())
    }

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn book() -> (Arc<InMemoryLedgerBackend>, LedgerBook) {
        let backend = Arc::new(InMemoryLedgerBackend::new());
        let book = LedgerBook::new(backend.clone());
        (backend, book)
    }

    // -----------------------------------------------------------------------
    // Lazy loading
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_owner_reads_empty() {
        let (_, mut book) = book();
        let owner = OwnerId::from_name("ghost");
        assert!(book.read_all(owner).is_empty());
        assert!(book.is_resident(&owner));
        assert!(!book.is_dirty(&owner));
    }

    #[test]
    fn persisted_owner_is_loaded_on_first_reference() {
        let (backend, mut book) = book();
        let owner = OwnerId::from_name("alice");
        let mut stored = PlayerLedger::new(owner);
        stored.add(hash("x"), 5, ts(1));
        backend.save(&stored).unwrap();

        assert_eq!(book.count(owner, &hash("x")), 5);
        assert_eq!(book.snapshot(owner), stored);
    }

    #[test]
    fn load_failure_yields_empty_ledger() {
        let (backend, mut book) = book();
        let owner = OwnerId::from_name("broken");
        backend.set_failing(owner, true);
        assert!(book.ledger(owner).is_empty());
        assert!(book.unreadable.contains(&owner));
        assert!(book.try_ledger(owner).is_err());
    }

    #[test]
    fn unreadable_owner_refuses_mutation_and_is_never_saved() {
        let (backend, mut book) = book();
        let owner = OwnerId::from_name("alice");
        book.add(owner, hash("x"), 100, ts(1)).unwrap();
        book.flush_owner(&owner).unwrap();
        book.release(&BTreeSet::new());

        backend.set_failing(owner, true);
        assert_eq!(book.count(owner, &hash("x")), 0);
        assert!(book.add(owner, hash("x"), 1, ts(2)).is_err());
        assert!(!book.is_dirty(&owner));

        backend.set_failing(owner, false);
        assert!(book.flush().written.is_empty());
        assert_eq!(backend.stored(&owner).unwrap().count(&hash("x")), 100);
        assert_eq!(backend.save_count(&owner), 1);
    }

    #[test]
    fn unreadable_owner_is_reloaded_once_readable() {
        let (backend, mut book) = book();
        let owner = OwnerId::from_name("alice");
        let mut stored = PlayerLedger::new(owner);
        stored.add(hash("x"), 7, ts(1));
        backend.save(&stored).unwrap();

        backend.set_failing(owner, true);
        book.ledger(owner);
        assert!(book.unreadable.contains(&owner));

        backend.set_failing(owner, false);
        assert_eq!(book.add(owner, hash("x"), 1, ts(2)).unwrap(), 8);
        assert!(!book.unreadable.contains(&owner));
        assert_eq!(book.try_ledger(owner).unwrap().count(&hash("x")), 8);
    }

    // -----------------------------------------------------------------------
    // Mutation and write-back
    // -----------------------------------------------------------------------

    #[test]
    fn add_marks_dirty_until_flushed() {
        let (backend, mut book) = book();
        let owner = OwnerId::from_name("alice");
        assert_eq!(book.add(owner, hash("x"), 4, ts(1)).unwrap(), 4);
        assert!(book.is_dirty(&owner));
        assert!(backend.stored(&owner).is_none());

        book.flush_owner(&owner).unwrap();
        assert!(!book.is_dirty(&owner));
        assert_eq!(backend.stored(&owner).unwrap().count(&hash("x")), 4);

        // Clean owners are not rewritten.
        book.flush_owner(&owner).unwrap();
        assert_eq!(backend.save_count(&owner), 1);
    }

    #[test]
    fn noop_add_does_not_dirty() {
        let (_, mut book) = book();
        let owner = OwnerId::from_name("alice");
        book.add(owner, hash("x"), -3, ts(1)).unwrap();
        assert!(!book.is_dirty(&owner));
    }

    #[test]
    fn failed_save_is_retried() {
        let (backend, mut book) = book();
        let owner = OwnerId::from_name("alice");
        book.add(owner, hash("x"), 2, ts(1)).unwrap();

        backend.set_failing(owner, true);
        let report = book.flush();
        assert_eq!(report.failed, vec![owner]);
        assert!(!report.is_clean());
        assert!(book.is_dirty(&owner));
        // In-memory state is intact.
        assert_eq!(book.count(owner, &hash("x")), 2);

        backend.set_failing(owner, false);
        let report = book.flush();
        assert_eq!(report.written, vec![owner]);
        assert!(report.is_clean());
        assert_eq!(backend.stored(&owner).unwrap().count(&hash("x")), 2);
    }

    #[test]
    fn replace_restores_a_snapshot() {
        let (_, mut book) = book();
        let owner = OwnerId::from_name("alice");
        book.add(owner, hash("x"), 2, ts(1)).unwrap();
        let snapshot = book.snapshot(owner);
        book.add(owner, hash("y"), 9, ts(2)).unwrap();

        book.replace(snapshot.clone());
        assert_eq!(book.snapshot(owner), snapshot);
        assert!(book.is_dirty(&owner));
    }

    // -----------------------------------------------------------------------
    // Release and enumeration
    // -----------------------------------------------------------------------

    #[test]
    fn release_keeps_dirty_and_retained() {
        let (_, mut book) = book();
        let online = OwnerId::from_name("online");
        let offline = OwnerId::from_name("offline");
        let unsaved = OwnerId::from_name("unsaved");
        book.ledger(online);
        book.ledger(offline);
        book.add(unsaved, hash("x"), 1, ts(1)).unwrap();

        book.release(&BTreeSet::from([online]));
        assert!(book.is_resident(&online));
        assert!(!book.is_resident(&offline));
        assert!(book.is_resident(&unsaved));
    }

    #[test]
    fn owners_unions_backend_and_resident() {
        let (backend, mut book) = book();
        let persisted = OwnerId::from_name("persisted");
        let fresh = OwnerId::from_name("fresh");
        backend.save(&PlayerLedger::new(persisted)).unwrap();
        book.add(fresh, hash("x"), 1, ts(1)).unwrap();

        assert_eq!(book.owners().unwrap(), BTreeSet::from([persisted, fresh]));
        assert_eq!(book.dirty_owners().copied().collect::<Vec<_>>(), vec![fresh]);
    }

    #[test]
    fn debug_format() {
        let (_, book) = book();
        assert!(format!("{book:?}").contains("LedgerBook"));
    }
}
