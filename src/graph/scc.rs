use crate::core::user::UserId;
use crate::graph::want_graph::WantGraph;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// A strongly connected component of the want graph.
///
/// Every user inside a component can reach every other through a chain of
/// "can give to" edges, so every swap cycle lives entirely inside one
/// component.
#[derive(Debug, Clone)]
pub struct StronglyConnectedComponent {
    /// Members, sorted by id.
    pub users: Vec<UserId>,
}

impl StronglyConnectedComponent {
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// True if the component is large enough to host a swap cycle.
    pub fn can_host_cycle(&self, min_len: usize) -> bool {
        self.users.len() >= min_len
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.users.binary_search(user).is_ok()
    }
}

/// Find all strongly connected components using Tarjan's algorithm.
pub fn find_sccs(graph: &WantGraph) -> Vec<StronglyConnectedComponent> {
    let mut digraph: DiGraph<UserId, ()> = DiGraph::new();
    let mut index: HashMap<&UserId, NodeIndex> = HashMap::new();

    for user in graph.users() {
        index.insert(user, digraph.add_node(user.clone()));
    }
    for user in graph.users() {
        let from = index[user];
        let mut seen: HashSet<&UserId> = HashSet::new();
        for edge in graph.outgoing(user) {
            if let Some(&to) = index.get(&edge.receiver) {
                if seen.insert(&edge.receiver) {
                    digraph.add_edge(from, to, ());
                }
            }
        }
    }

    let mut components: Vec<StronglyConnectedComponent> = tarjan_scc(&digraph)
        .into_iter()
        .map(|nodes| {
            let mut users: Vec<UserId> = nodes.into_iter().map(|n| digraph[n].clone()).collect();
            users.sort();
            StronglyConnectedComponent { users }
        })
        .collect();
    components.sort_by(|a, b| a.users.cmp(&b.users));
    components
}

/// The component containing `user`, if the user is in the graph.
pub fn component_of(graph: &WantGraph, user: &UserId) -> Option<StronglyConnectedComponent> {
    find_sccs(graph).into_iter().find(|c| c.contains(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::matcher::MatchKind;
    use crate::graph::want_graph::WantEdge;
    use rust_decimal_macros::dec;

    fn edge(from: &str, to: &str) -> WantEdge {
        WantEdge {
            giver: from.into(),
            receiver: to.into(),
            item: format!("{}-item", from).as_str().into(),
            value: dec!(10),
            kind: MatchKind::Exact,
            wanted: "any".into(),
        }
    }

    fn graph(edges: Vec<WantEdge>) -> WantGraph {
        WantGraph::from_edges("A".into(), edges, HashMap::new())
    }

    #[test]
    fn test_single_scc() {
        let g = graph(vec![edge("A", "B"), edge("B", "C"), edge("C", "A")]);
        let sccs = find_sccs(&g);
        let hosting: Vec<_> = sccs.iter().filter(|s| s.can_host_cycle(3)).collect();
        assert_eq!(hosting.len(), 1);
        assert_eq!(hosting[0].len(), 3);
    }

    #[test]
    fn test_disjoint_components() {
        let g = graph(vec![
            edge("A", "B"),
            edge("B", "A"),
            edge("C", "D"),
            edge("D", "C"),
        ]);
        let sccs = find_sccs(&g);
        let pairs: Vec<_> = sccs.iter().filter(|s| s.len() == 2).collect();
        assert_eq!(pairs.len(), 2);
        assert!(sccs.iter().all(|s| !s.can_host_cycle(3)));
    }

    #[test]
    fn test_chain_is_all_singletons() {
        let g = graph(vec![edge("A", "B"), edge("B", "C")]);
        assert!(find_sccs(&g).iter().all(|s| s.len() == 1));
    }

    #[test]
    fn test_component_of() {
        let g = graph(vec![edge("A", "B"), edge("B", "C"), edge("C", "A"), edge("C", "D")]);
        let c = component_of(&g, &"A".into()).unwrap();
        assert!(c.contains(&"C".into()));
        assert!(!c.contains(&"D".into()));
        assert!(component_of(&g, &"Z".into()).is_none());
    }
}
