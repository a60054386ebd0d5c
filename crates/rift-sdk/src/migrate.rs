//! Migration from the legacy slot inventory.

use tracing::{info, warn};

use rift_ledger::{LegacyInventory, PlayerLedger};
use rift_types::{OwnerId, TemplateHash, Timestamp};

use crate::engine::RiftEngine;
use crate::error::EngineResult;

impl RiftEngine {
    /// Move `owner`'s legacy inventory into their ledger.
    ///
    /// Returns `Ok(false)` with no side effect when the legacy inventory is
    /// empty. Otherwise every non-empty slot is credited, the ledger is
    /// written, and the legacy inventory is cleared. If any of that fails,
    /// the ledger and reference counts are restored and the legacy
    /// inventory is left as it was. Templates created along the way are
    /// kept; they are inert until referenced. An unreadable ledger fails
    /// the migration before anything is credited.
    ///
    /// On success everyone viewing `owner`'s ledger is resynced.
    pub fn migrate_one(&mut self, owner: OwnerId) -> EngineResult<bool> {
        let inventory = self.legacy.load(&owner)?;
        if inventory.is_empty() {
            return Ok(false);
        }

        let snapshot = match self.ledgers.try_ledger(owner) {
            Ok(ledger) => ledger.clone(),
            Err(e) => {
                self.release();
                return Err(e.into());
            }
        };
        let mut applied = Vec::new();
        if let Err(e) = self.apply_legacy(owner, &inventory, &mut applied) {
            warn!(owner = %owner, error = %e, "migration failed; rolling back");
            self.rollback(snapshot, &applied);
            self.release();
            return Err(e);
        }

        if let Err(e) = self.index.save() {
            warn!(error = %e, "template index save failed; will retry");
        }
        let units: i64 = applied.iter().map(|(_, delta)| *delta).sum();
        info!(owner = %owner, stacks = applied.len(), units, "legacy inventory migrated");
        self.notify(owner);
        self.release();
        Ok(true)
    }

    fn apply_legacy(
        &mut self,
        owner: OwnerId,
        inventory: &LegacyInventory,
        applied: &mut Vec<(TemplateHash, i64)>,
    ) -> EngineResult<()> {
        let now = Timestamp::now();
        for stack in inventory.stacks() {
            let hash = self.hasher.hash(&stack.variant)?;
            let delta = i64::try_from(stack.count).unwrap_or(i64::MAX);
            self.index
                .put_template(hash, &stack.variant, self.hasher.context(), now);
            self.ledgers.add(owner, hash, delta, now)?;
            self.index.inc_ref(&hash, delta)?;
            applied.push((hash, delta));
        }
        self.ledgers.flush_owner(&owner)?;
        self.legacy.clear(&owner)?;
        Ok(())
    }

    fn rollback(&mut self, snapshot: PlayerLedger, applied: &[(TemplateHash, i64)]) {
        let owner = snapshot.owner();
        for (hash, delta) in applied {
            if let Err(e) = self.index.inc_ref(hash, -delta) {
                warn!(template = %hash.short_hex(), error = %e, "reference count not restored");
            }
        }
        self.ledgers.replace(snapshot);
        if let Err(e) = self.ledgers.flush_owner(&owner) {
            warn!(owner = %owner, error = %e, "restored ledger not saved; will retry");
        }
    }
}
