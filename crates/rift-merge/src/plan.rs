use std::collections::BTreeSet;

use rift_types::OwnerId;

use crate::graph::DelegationGraph;

/// Which owners' ledgers a viewer sees, in visit order.
///
/// `members` holds the viewer first, then each root, then every online
/// owner delegating to that root. Each owner appears once. The same list
/// is the notification group for a mutation made by the viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewPlan {
    pub viewer: OwnerId,
    pub roots: Vec<OwnerId>,
    pub members: Vec<OwnerId>,
}

impl ViewPlan {
    /// Plan the view of `viewer` given the graph and the online owners.
    ///
    /// A viewer with no root is its own root. Roots are included whether
    /// or not they are online; other delegators only while online.
    pub fn for_viewer(viewer: OwnerId, graph: &DelegationGraph, online: &BTreeSet<OwnerId>) -> Self {
        let roots = match graph.root_of(&viewer) {
            Some(root) => vec![root],
            None => vec![viewer],
        };

        fn push(members: &mut Vec<OwnerId>, owner: OwnerId) {
            if !members.contains(&owner) {
                members.push(owner);
            }
        }

        let mut members = vec![viewer];
        for root in &roots {
            push(&mut members, *root);
            for delegator in graph.delegators_of(root) {
                if online.contains(&delegator) {
                    push(&mut members, delegator);
                }
            }
        }

        Self {
            viewer,
            roots,
            members,
        }
    }

    pub fn contains(&self, owner: &OwnerId) -> bool {
        self.members.contains(owner)
    }

    /// Members currently online, in visit order.
    pub fn online_members<'a>(
        &'a self,
        online: &'a BTreeSet<OwnerId>,
    ) -> impl Iterator<Item = OwnerId> + 'a {
        self.members.iter().copied().filter(move |m| online.contains(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_types::BindingId;

    fn owner(name: &str) -> OwnerId {
        OwnerId::from_name(name)
    }

    fn online(names: &[&str]) -> BTreeSet<OwnerId> {
        names.iter().map(|n| owner(n)).collect()
    }

    #[test]
    fn lone_owner_sees_only_themselves() {
        let graph = DelegationGraph::new();
        let plan = ViewPlan::for_viewer(owner("alice"), &graph, &online(&["alice"]));
        assert_eq!(plan.roots, vec![owner("alice")]);
        assert_eq!(plan.members, vec![owner("alice")]);
    }

    #[test]
    fn delegator_sees_root_and_peers() {
        let mut graph = DelegationGraph::new();
        graph.bind(BindingId::new(), owner("bob"), owner("alice")).unwrap();
        graph.bind(BindingId::new(), owner("carol"), owner("alice")).unwrap();

        let plan = ViewPlan::for_viewer(owner("bob"), &graph, &online(&["bob", "carol"]));
        assert_eq!(plan.roots, vec![owner("alice")]);
        assert_eq!(plan.members[0], owner("bob"));
        assert_eq!(plan.members[1], owner("alice"));
        assert!(plan.contains(&owner("carol")));
        assert_eq!(plan.members.len(), 3);
    }

    #[test]
    fn offline_delegators_are_excluded_but_offline_root_is_not() {
        let mut graph = DelegationGraph::new();
        graph.bind(BindingId::new(), owner("bob"), owner("alice")).unwrap();
        graph.bind(BindingId::new(), owner("carol"), owner("alice")).unwrap();

        let plan = ViewPlan::for_viewer(owner("bob"), &graph, &online(&["bob"]));
        assert_eq!(plan.members, vec![owner("bob"), owner("alice")]);
        assert_eq!(
            plan.online_members(&online(&["bob"])).collect::<Vec<_>>(),
            vec![owner("bob")]
        );
    }

    #[test]
    fn root_sees_online_delegators() {
        let mut graph = DelegationGraph::new();
        graph.bind(BindingId::new(), owner("bob"), owner("alice")).unwrap();

        let plan = ViewPlan::for_viewer(owner("alice"), &graph, &online(&["alice", "bob"]));
        assert_eq!(plan.members, vec![owner("alice"), owner("bob")]);

        let plan = ViewPlan::for_viewer(owner("alice"), &graph, &online(&["alice"]));
        assert_eq!(plan.members, vec![owner("alice")]);
    }
}
