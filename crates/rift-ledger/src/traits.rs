use std::collections::BTreeSet;

use rift_types::OwnerId;

use crate::entry::PlayerLedger;
use crate::error::LedgerResult;

/// Durable storage for per-owner ledgers.
///
/// One record per owner. Records of offline owners must be readable and
/// writable without that owner being connected.
pub trait LedgerBackend: Send + Sync {
    /// Load an owner's ledger. `Ok(None)` if the owner has never been saved.
    fn load(&self, owner: &OwnerId) -> LedgerResult<Option<PlayerLedger>>;

    /// Persist an owner's ledger, replacing any previous record.
    fn save(&self, ledger: &PlayerLedger) -> LedgerResult<()>;

    /// Every owner with a persisted record.
    fn owners(&self) -> LedgerResult<BTreeSet<OwnerId>>;
}
