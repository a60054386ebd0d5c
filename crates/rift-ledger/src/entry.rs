use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rift_types::{OwnerId, TemplateHash, Timestamp};

/// One owner's holding of one template.
///
/// `count` is always positive while the entry exists; an entry whose count
/// would reach zero is removed from its ledger instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub template: TemplateHash,
    pub count: u64,
    pub last_touched: Timestamp,
}

/// An owner's per-template quantity ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLedger {
    owner: OwnerId,
    entries: BTreeMap<TemplateHash, LedgerEntry>,
}

impl PlayerLedger {
    /// An empty ledger for `owner`.
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            entries: BTreeMap::new(),
        }
    }

    /// Build a ledger from persisted entries, dropping any zero counts.
    pub fn from_entries(owner: OwnerId, entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|e| e.count > 0)
            .map(|e| (e.template, e))
            .collect();
        Self { owner, entries }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Apply a signed quantity change to one template.
    ///
    /// If the resulting count would be zero or less the entry is removed;
    /// otherwise the count and `timestamp` are stored. Returns the new
    /// count.
    pub fn add(&mut self, template: TemplateHash, delta: i64, timestamp: Timestamp) -> u64 {
        let current = self.count(&template);
        let updated = if delta >= 0 {
            current.saturating_add(delta as u64)
        } else {
            current.saturating_sub(delta.unsigned_abs())
        };

        if updated == 0 {
            self.entries.remove(&template);
        } else {
            self.entries.insert(
                template,
                LedgerEntry {
                    template,
                    count: updated,
                    last_touched: timestamp,
                },
            );
        }
        updated
    }

    /// Units held of `template` (zero if absent).
    pub fn count(&self, template: &TemplateHash) -> u64 {
        self.entries.get(template).map(|e| e.count).unwrap_or(0)
    }

    pub fn entry(&self, template: &TemplateHash) -> Option<&LedgerEntry> {
        self.entries.get(template)
    }

    /// Every non-zero entry, keyed by template.
    pub fn entries(&self) -> &BTreeMap<TemplateHash, LedgerEntry> {
        &self.entries
    }

    /// Entries in storage order: oldest touch first, ties broken by hash.
    pub fn ordered(&self) -> Vec<&LedgerEntry> {
        let mut ordered: Vec<&LedgerEntry> = self.entries.values().collect();
        ordered.sort_by(|a, b| {
            a.last_touched
                .cmp(&b.last_touched)
                .then(a.template.cmp(&b.template))
        });
        ordered
    }

    /// Total units across all templates.
    pub fn total_units(&self) -> u64 {
        self.entries.values().map(|e| e.count).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
