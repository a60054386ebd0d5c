//! The delegation graph.
//!
//! Edges are stored by binding, with two derived adjacency maps kept in step
//! on every mutation: delegator to root (with the bindings carrying that
//! edge) and root to delegators. Every edge is validated when it is added,
//! so the graph never contains a chain or a cycle.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rift_types::{BindingId, OwnerId};

use crate::error::{MergeError, MergeResult, RejectReason};

/// One bound sharing object: `delegator`'s view merges into `root`'s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationEdge {
    pub binding: BindingId,
    pub delegator: OwnerId,
    pub root: OwnerId,
}

#[derive(Clone, Debug)]
struct Delegation {
    root: OwnerId,
    bindings: BTreeSet<BindingId>,
}

/// Incrementally maintained delegation edges.
///
/// Invariants, enforced by [`DelegationGraph::bind`]:
/// - no owner delegates to themselves;
/// - a delegator has at most one root (several bindings may carry the same
///   edge);
/// - no root is itself a delegator.
#[derive(Clone, Debug, Default)]
pub struct DelegationGraph {
    edges: BTreeMap<BindingId, DelegationEdge>,
    outgoing: BTreeMap<OwnerId, Delegation>,
    incoming: BTreeMap<OwnerId, BTreeSet<OwnerId>>,
}

impl DelegationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// The root `owner` delegates to, if any.
    pub fn root_of(&self, owner: &OwnerId) -> Option<OwnerId> {
        self.outgoing.get(owner).map(|d| d.root)
    }

    /// `true` if `owner` delegates to some root.
    pub fn is_dependent(&self, owner: &OwnerId) -> bool {
        self.outgoing.contains_key(owner)
    }

    /// Owners delegating to `root`, in id order.
    pub fn delegators_of(&self, root: &OwnerId) -> Vec<OwnerId> {
        self.incoming
            .get(root)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// `true` if at least one owner delegates to `owner`.
    pub fn is_root(&self, owner: &OwnerId) -> bool {
        self.incoming.contains_key(owner)
    }

    pub fn edge(&self, binding: &BindingId) -> Option<&DelegationEdge> {
        self.edges.get(binding)
    }

    /// Every edge, in binding order.
    pub fn edges(&self) -> impl Iterator<Item = &DelegationEdge> {
        self.edges.values()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Bind a sharing object, adding the edge `delegator -> root`.
    ///
    /// Returns `true` if the binding is new and `false` if the same binding
    /// already carries this exact edge. A binding id already carrying a
    /// different edge is a [`MergeError::BindingConflict`]; an edge that
    /// would create a chain or cycle is
    /// [`MergeError::DelegationCycleRejected`].
    pub fn bind(
        &mut self,
        binding: BindingId,
        delegator: OwnerId,
        root: OwnerId,
    ) -> MergeResult<bool> {
        if let Some(existing) = self.edges.get(&binding) {
            if existing.delegator == delegator && existing.root == root {
                return Ok(false);
            }
            return Err(MergeError::BindingConflict(binding));
        }

        if let Err(reason) = self.check(delegator, root) {
            warn!(
                delegator = %delegator,
                root = %root,
                %reason,
                "delegation rejected"
            );
            return Err(MergeError::DelegationCycleRejected {
                delegator,
                root,
                reason,
            });
        }

        self.edges.insert(
            binding,
            DelegationEdge {
                binding,
                delegator,
                root,
            },
        );
        self.outgoing
            .entry(delegator)
            .or_insert_with(|| Delegation {
                root,
                bindings: BTreeSet::new(),
            })
            .bindings
            .insert(binding);
        self.incoming.entry(root).or_default().insert(delegator);

        debug!(binding = %binding, delegator = %delegator, root = %root, "delegation bound");
        Ok(true)
    }

    fn check(&self, delegator: OwnerId, root: OwnerId) -> Result<(), RejectReason> {
        if delegator == root {
            return Err(RejectReason::SelfDelegation);
        }
        if self.is_dependent(&root) {
            return Err(RejectReason::RootIsDependent);
        }
        if let Some(existing) = self.root_of(&delegator) {
            if existing != root {
                return Err(RejectReason::AlreadyDelegating { existing });
            }
        }
        if self.is_root(&delegator) {
            return Err(RejectReason::DelegatorIsRoot);
        }
        Ok(())
    }

    /// Remove a binding, returning the edge it carried.
    ///
    /// The delegator stays dependent while any other binding carries the
    /// same edge.
    pub fn unbind(&mut self, binding: &BindingId) -> MergeResult<DelegationEdge> {
        let edge = self
            .edges
            .remove(binding)
            .ok_or(MergeError::UnknownBinding(*binding))?;

        if let Some(delegation) = self.outgoing.get_mut(&edge.delegator) {
            delegation.bindings.remove(binding);
            if delegation.bindings.is_empty() {
                self.outgoing.remove(&edge.delegator);
                if let Some(delegators) = self.incoming.get_mut(&edge.root) {
                    delegators.remove(&edge.delegator);
                    if delegators.is_empty() {
                        self.incoming.remove(&edge.root);
                    }
                }
            }
        }

        debug!(binding = %binding, delegator = %edge.delegator, root = %edge.root, "delegation unbound");
        Ok(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(name: &str) -> OwnerId {
        OwnerId::from_name(name)
    }

    fn rejected(result: MergeResult<bool>) -> RejectReason {
        match result {
            Err(MergeError::DelegationCycleRejected { reason, .. }) => reason,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------------

    #[test]
    fn bind_records_both_directions() {
        let mut graph = DelegationGraph::new();
        let binding = BindingId::new();
        assert!(graph.bind(binding, owner("bob"), owner("alice")).unwrap());

        assert_eq!(graph.root_of(&owner("bob")), Some(owner("alice")));
        assert!(graph.is_dependent(&owner("bob")));
        assert!(graph.is_root(&owner("alice")));
        assert_eq!(graph.delegators_of(&owner("alice")), vec![owner("bob")]);
        assert_eq!(graph.edge(&binding).unwrap().root, owner("alice"));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn rebinding_same_edge_is_idempotent() {
        let mut graph = DelegationGraph::new();
        let binding = BindingId::new();
        assert!(graph.bind(binding, owner("bob"), owner("alice")).unwrap());
        assert!(!graph.bind(binding, owner("bob"), owner("alice")).unwrap());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn reused_binding_for_other_edge_conflicts() {
        let mut graph = DelegationGraph::new();
        let binding = BindingId::new();
        graph.bind(binding, owner("bob"), owner("alice")).unwrap();
        assert_eq!(
            graph.bind(binding, owner("carol"), owner("alice")),
            Err(MergeError::BindingConflict(binding))
        );
    }

    #[test]
    fn several_objects_may_carry_one_edge() {
        let mut graph = DelegationGraph::new();
        let first = BindingId::new();
        let second = BindingId::new();
        graph.bind(first, owner("bob"), owner("alice")).unwrap();
        graph.bind(second, owner("bob"), owner("alice")).unwrap();

        graph.unbind(&first).unwrap();
        assert_eq!(graph.root_of(&owner("bob")), Some(owner("alice")));
        graph.unbind(&second).unwrap();
        assert!(!graph.is_dependent(&owner("bob")));
        assert!(!graph.is_root(&owner("alice")));
        assert!(graph.is_empty());
    }

    // -----------------------------------------------------------------------
    // Anti-cycle rules
    // -----------------------------------------------------------------------

    #[test]
    fn self_delegation_is_rejected() {
        let mut graph = DelegationGraph::new();
        assert_eq!(
            rejected(graph.bind(BindingId::new(), owner("alice"), owner("alice"))),
            RejectReason::SelfDelegation
        );
    }

    #[test]
    fn reverse_edge_is_rejected() {
        let mut graph = DelegationGraph::new();
        graph.bind(BindingId::new(), owner("a"), owner("b")).unwrap();
        assert_eq!(
            rejected(graph.bind(BindingId::new(), owner("b"), owner("a"))),
            RejectReason::RootIsDependent
        );
    }

    #[test]
    fn second_root_is_rejected() {
        let mut graph = DelegationGraph::new();
        graph.bind(BindingId::new(), owner("a"), owner("b")).unwrap();
        assert_eq!(
            rejected(graph.bind(BindingId::new(), owner("a"), owner("c"))),
            RejectReason::AlreadyDelegating { existing: owner("b") }
        );
    }

    #[test]
    fn chaining_through_a_dependent_is_rejected() {
        let mut graph = DelegationGraph::new();
        graph.bind(BindingId::new(), owner("b"), owner("c")).unwrap();
        // a -> b where b -> c
        assert_eq!(
            rejected(graph.bind(BindingId::new(), owner("a"), owner("b"))),
            RejectReason::RootIsDependent
        );
    }

    #[test]
    fn root_cannot_become_dependent() {
        let mut graph = DelegationGraph::new();
        graph.bind(BindingId::new(), owner("a"), owner("b")).unwrap();
        // b is a root for a; b -> c would make a two-hop chain.
        assert_eq!(
            rejected(graph.bind(BindingId::new(), owner("b"), owner("c"))),
            RejectReason::DelegatorIsRoot
        );
    }

    #[test]
    fn rejected_bind_leaves_graph_untouched() {
        let mut graph = DelegationGraph::new();
        graph.bind(BindingId::new(), owner("a"), owner("b")).unwrap();
        let _ = graph.bind(BindingId::new(), owner("b"), owner("a"));
        assert_eq!(graph.len(), 1);
        assert!(!graph.is_dependent(&owner("b")));
    }

    // -----------------------------------------------------------------------
    // Unbinding
    // -----------------------------------------------------------------------

    #[test]
    fn unbind_unknown_binding_fails() {
        let mut graph = DelegationGraph::new();
        let binding = BindingId::new();
        assert_eq!(graph.unbind(&binding), Err(MergeError::UnknownBinding(binding)));
    }

    #[test]
    fn unbind_frees_the_delegator() {
        let mut graph = DelegationGraph::new();
        let binding = BindingId::new();
        graph.bind(binding, owner("a"), owner("b")).unwrap();
        let edge = graph.unbind(&binding).unwrap();
        assert_eq!(edge.delegator, owner("a"));

        // a may now delegate elsewhere, and b may now become dependent.
        graph.bind(BindingId::new(), owner("a"), owner("c")).unwrap();
        graph.bind(BindingId::new(), owner("b"), owner("c")).unwrap();
        assert_eq!(graph.delegators_of(&owner("c")).len(), 2);
    }
}
