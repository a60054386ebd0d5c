use std::collections::BTreeMap;

use rift_ledger::{LedgerBook, PlayerLedger};
use rift_types::{TemplateHash, Timestamp};

use crate::plan::ViewPlan;

/// One template's total across the merged ledgers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewEntry {
    pub template: TemplateHash,
    pub count: u64,
    /// Earliest `last_touched` among the contributing entries.
    pub stored_at: Timestamp,
}

/// Per-template totals across several ledgers.
///
/// Totals and timestamps do not depend on the order ledgers are absorbed
/// in. Display order does: templates appear in the order they were first
/// seen, which follows owner visit order and then each ledger's storage
/// order.
#[derive(Clone, Debug, Default)]
pub struct MergedView {
    totals: BTreeMap<TemplateHash, ViewEntry>,
    order: Vec<TemplateHash>,
}

impl MergedView {
    /// Build the view described by `plan`, loading offline ledgers as
    /// needed.
    pub fn build(plan: &ViewPlan, book: &mut LedgerBook) -> Self {
        let mut view = Self::default();
        for member in &plan.members {
            view.absorb(book.ledger(*member));
        }
        view
    }

    /// Aggregate an arbitrary set of ledgers.
    pub fn aggregate<'a>(ledgers: impl IntoIterator<Item = &'a PlayerLedger>) -> Self {
        let mut view = Self::default();
        for ledger in ledgers {
            view.absorb(ledger);
        }
        view
    }

    /// Add one ledger's entries to the view.
    pub fn absorb(&mut self, ledger: &PlayerLedger) {
        for entry in ledger.ordered() {
            match self.totals.get_mut(&entry.template) {
                Some(total) => {
                    total.count = total.count.saturating_add(entry.count);
                    total.stored_at = total.stored_at.min(entry.last_touched);
                }
                None => {
                    self.totals.insert(
                        entry.template,
                        ViewEntry {
                            template: entry.template,
                            count: entry.count,
                            stored_at: entry.last_touched,
                        },
                    );
                    self.order.push(entry.template);
                }
            }
        }
    }

    /// Total units of `template` visible in the view.
    pub fn count(&self, template: &TemplateHash) -> u64 {
        self.totals.get(template).map(|e| e.count).unwrap_or(0)
    }

    pub fn entry(&self, template: &TemplateHash) -> Option<&ViewEntry> {
        self.totals.get(template)
    }

    /// Entries in display order.
    pub fn entries(&self) -> impl Iterator<Item = &ViewEntry> {
        self.order.iter().filter_map(|h| self.totals.get(h))
    }

    /// Entries keyed by template.
    pub fn totals(&self) -> &BTreeMap<TemplateHash, ViewEntry> {
        &self.totals
    }

    pub fn total_units(&self) -> u64 {
        self.totals.values().map(|e| e.count).sum()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use proptest::prelude::*;
    use rift_ledger::{InMemoryLedgerBackend, LedgerBackend};
    use rift_types::{BindingId, OwnerId};

    use crate::graph::DelegationGraph;

    fn hash(name: &str) -> TemplateHash {
        TemplateHash::from_bytes(name.as_bytes())
    }

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn ledger(name: &str, items: &[(&str, i64, u64)]) -> PlayerLedger {
        let mut ledger = PlayerLedger::new(OwnerId::from_name(name));
        for (item, count, at) in items {
            ledger.add(hash(item), *count, ts(*at));
        }
        ledger
    }

    // -----------------------------------------------------------------------
    // Aggregation
    // -----------------------------------------------------------------------

    #[test]
    fn sums_counts_and_keeps_earliest_timestamp() {
        let alice = ledger("alice", &[("x", 5, 30), ("y", 1, 10)]);
        let bob = ledger("bob", &[("x", 2, 20)]);
        let view = MergedView::aggregate([&alice, &bob]);

        assert_eq!(view.count(&hash("x")), 7);
        assert_eq!(view.entry(&hash("x")).unwrap().stored_at, ts(20));
        assert_eq!(view.count(&hash("y")), 1);
        assert_eq!(view.count(&hash("z")), 0);
        assert_eq!(view.total_units(), 8);
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn display_order_follows_visit_then_storage_order() {
        let alice = ledger("alice", &[("late", 1, 50), ("early", 1, 5)]);
        let bob = ledger("bob", &[("bobs", 1, 1), ("late", 1, 2)]);
        let view = MergedView::aggregate([&alice, &bob]);

        let order: Vec<TemplateHash> = view.entries().map(|e| e.template).collect();
        assert_eq!(order, vec![hash("early"), hash("late"), hash("bobs")]);
    }

    #[test]
    fn empty_inputs_give_empty_view() {
        let view = MergedView::aggregate(std::iter::empty());
        assert!(view.is_empty());
        assert_eq!(view.entries().count(), 0);
    }

    // -----------------------------------------------------------------------
    // Building from a plan
    // -----------------------------------------------------------------------

    #[test]
    fn build_loads_offline_root() {
        let backend = Arc::new(InMemoryLedgerBackend::new());
        backend.save(&ledger("alice", &[("x", 5, 1)])).unwrap();
        let mut book = LedgerBook::new(backend);

        let mut graph = DelegationGraph::new();
        graph
            .bind(BindingId::new(), OwnerId::from_name("bob"), OwnerId::from_name("alice"))
            .unwrap();
        let online = BTreeSet::from([OwnerId::from_name("bob")]);
        let plan = ViewPlan::for_viewer(OwnerId::from_name("bob"), &graph, &online);

        let view = MergedView::build(&plan, &mut book);
        assert_eq!(view.count(&hash("x")), 5);
    }

    proptest! {
        #[test]
        fn totals_are_independent_of_visit_order(
            owners in proptest::collection::vec(
                proptest::collection::vec((0usize..4, 1i64..50, 0u64..100), 0..6),
                1..5,
            ),
            seed in any::<u64>(),
        ) {
            let names = ["a", "b", "c", "d"];
            let ledgers: Vec<PlayerLedger> = owners
                .iter()
                .enumerate()
                .map(|(i, items)| {
                    let mut ledger = PlayerLedger::new(OwnerId::from_name(&format!("owner-{i}")));
                    for (item, count, at) in items {
                        ledger.add(hash(names[*item]), *count, ts(*at));
                    }
                    ledger
                })
                .collect();

            let forward = MergedView::aggregate(ledgers.iter());
            let backward = MergedView::aggregate(ledgers.iter().rev());
            let mut rotated: Vec<&PlayerLedger> = ledgers.iter().collect();
            let len = rotated.len();
            rotated.rotate_left((seed as usize) % len);
            let rotated = MergedView::aggregate(rotated);

            prop_assert_eq!(forward.totals(), backward.totals());
            prop_assert_eq!(forward.totals(), rotated.totals());
        }
    }
}
