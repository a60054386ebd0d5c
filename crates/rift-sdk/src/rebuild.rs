//! Reference-count reconstruction and integrity checking.
//!
//! Both walk every known owner's ledger exactly once and sum counts per
//! template. [`RiftEngine::rebuild`] writes the sums back into the index;
//! [`RiftEngine::verify`] only reports where they disagree. An owner whose
//! ledger cannot be read aborts either walk before anything is changed.

use std::collections::BTreeMap;

use tracing::{info, warn};

use rift_crypto::VariantHasher;
use rift_types::{OwnerId, TemplateHash};

use crate::engine::RiftEngine;
use crate::error::EngineResult;

/// Outcome of a [`RiftEngine::rebuild`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub owners_visited: usize,
    /// Templates whose reference count changed.
    pub templates_updated: usize,
    /// Zero-count templates removed by cleanup.
    pub templates_removed: usize,
    /// Ledger entries whose template is missing from the index. They are
    /// left in place.
    pub unknown_references: Vec<(OwnerId, TemplateHash)>,
    /// Sum of all reference counts after the rebuild.
    pub total_refs: u64,
}

/// Result of an integrity check.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub owners_checked: usize,
    pub templates_checked: usize,
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub template: TemplateHash,
    pub owner: Option<OwnerId>,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// A ledger entry names a template the index does not hold.
    UnknownTemplate,
    /// A template's reference count differs from the ledger total.
    RefCountDrift,
    /// A template's sample does not hash to its key.
    HashMismatch,
}

struct Tally {
    owners: usize,
    counts: BTreeMap<TemplateHash, u64>,
    unknown: Vec<(OwnerId, TemplateHash)>,
}

impl RiftEngine {
    fn tally(&mut self) -> EngineResult<Tally> {
        let owners = self.ledgers.owners()?;
        let mut tally = Tally {
            owners: owners.len(),
            counts: BTreeMap::new(),
            unknown: Vec::new(),
        };
        for owner in owners {
            if let Err(e) = self.ledgers.try_ledger(owner) {
                warn!(owner = %owner, error = %e, "ledger unreadable; walk aborted");
                self.release();
                return Err(e.into());
            }
            for (hash, entry) in self.ledgers.read_all(owner) {
                if self.index.contains(hash) {
                    let sum = tally.counts.entry(*hash).or_default();
                    *sum = sum.saturating_add(entry.count);
                } else {
                    tally.unknown.push((owner, *hash));
                }
            }
            self.release();
        }
        Ok(tally)
    }

    /// Recompute every template's reference count from the ledgers.
    ///
    /// With `cleanup`, templates whose recomputed count is zero are
    /// removed. Entries referencing unknown templates are reported and left
    /// alone. The index is saved afterwards.
    pub fn rebuild(&mut self, cleanup: bool) -> EngineResult<RebuildReport> {
        let tally = self.tally()?;
        let mut report = RebuildReport {
            owners_visited: tally.owners,
            ..RebuildReport::default()
        };

        for hash in self.index.hashes() {
            let actual = tally.counts.get(&hash).copied().unwrap_or(0);
            let recorded = self.index.find(&hash).map(|t| t.ref_count).unwrap_or(0);
            if actual != recorded {
                self.index.set_ref(&hash, actual)?;
                report.templates_updated += 1;
            }
            if cleanup && actual == 0 {
                self.index.remove(&hash);
                report.templates_removed += 1;
            }
        }

        for (owner, hash) in &tally.unknown {
            warn!(owner = %owner, template = %hash.short_hex(), "ledger entry references unknown template");
        }
        report.unknown_references = tally.unknown;
        report.total_refs = self.index.total_refs();

        self.index.save()?;
        info!(
            owners = report.owners_visited,
            updated = report.templates_updated,
            removed = report.templates_removed,
            unknown = report.unknown_references.len(),
            "reference counts rebuilt"
        );
        Ok(report)
    }

    /// Check the ledgers against the index without changing either.
    pub fn verify(&mut self) -> EngineResult<IntegrityReport> {
        let tally = self.tally()?;
        let mut report = IntegrityReport {
            owners_checked: tally.owners,
            templates_checked: self.index.len(),
            violations: Vec::new(),
        };

        for (owner, hash) in tally.unknown {
            report.violations.push(Violation {
                template: hash,
                owner: Some(owner),
                kind: ViolationKind::UnknownTemplate,
                description: format!("ledger of {owner} references unknown template {}", hash.short_hex()),
            });
        }
        for template in self.index.iter() {
            let hasher = VariantHasher::new(template.context.clone());
            if !hasher.verify(&template.sample, &template.hash) {
                report.violations.push(Violation {
                    template: template.hash,
                    owner: None,
                    kind: ViolationKind::HashMismatch,
                    description: format!(
                        "sample {} does not hash to {}",
                        template.sample.kind,
                        template.hash.short_hex()
                    ),
                });
            }
            let actual = tally.counts.get(&template.hash).copied().unwrap_or(0);
            if actual != template.ref_count {
                report.violations.push(Violation {
                    template: template.hash,
                    owner: None,
                    kind: ViolationKind::RefCountDrift,
                    description: format!(
                        "recorded {} references, ledgers hold {actual}",
                        template.ref_count
                    ),
                });
            }
        }
        Ok(report)
    }
}
