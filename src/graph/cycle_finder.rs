use crate::core::config::{EngineConfig, MIN_CYCLE_LENGTH};
use crate::core::item::ItemId;
use crate::core::user::UserId;
use crate::graph::scc::component_of;
use crate::graph::want_graph::{OpportunityFilters, WantEdge, WantGraph};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A closed exchange loop found in the want graph.
///
/// `edges[i]` carries an item from `edges[i].giver` to `edges[i].receiver`,
/// which is `edges[i + 1].giver`; the last edge returns to the first giver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCycle {
    pub edges: Vec<WantEdge>,
}

impl RawCycle {
    /// Number of participants (and edges).
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Participants in giving order.
    pub fn users(&self) -> Vec<&UserId> {
        self.edges.iter().map(|e| &e.giver).collect()
    }

    /// Items in giving order.
    pub fn items(&self) -> Vec<&ItemId> {
        self.edges.iter().map(|e| &e.item).collect()
    }

    /// Every edge hands over to the next giver, wrapping around.
    pub fn is_closed(&self) -> bool {
        let n = self.edges.len();
        n > 0
            && (0..n).all(|i| self.edges[i].receiver == self.edges[(i + 1) % n].giver)
    }

    pub fn contains_user(&self, user: &UserId) -> bool {
        self.edges.iter().any(|e| &e.giver == user)
    }
}

/// Result of one bounded search.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub cycles: Vec<RawCycle>,
    /// Edge expansions performed.
    pub steps: usize,
    /// True when a step or result cap cut the search short.
    pub truncated: bool,
}

/// Depth-first search for swap cycles through one user.
///
/// Pruning happens during the walk: paths that would exceed the maximum
/// length, whose trust product drops under the floor, or (in balanced-only
/// mode) that use an item too far in value from the requester's own item
/// are abandoned. Only users in the start user's strongly connected
/// component are visited.
#[derive(Debug, Clone)]
pub struct CycleFinder {
    pub max_len: usize,
    pub trust_floor: f64,
    /// Balanced-only mode: allowed relative deviation from the start item value.
    pub balanced_ratio: Option<Decimal>,
    pub max_results: usize,
    pub max_steps: usize,
}

impl CycleFinder {
    pub fn from_config(config: &EngineConfig, filters: &OpportunityFilters) -> Self {
        let max_len = filters
            .max_cycle_length
            .map_or(config.max_cycle_length, |l| l.min(config.max_cycle_length))
            .max(MIN_CYCLE_LENGTH);
        Self {
            max_len,
            trust_floor: config.path_trust_floor,
            balanced_ratio: filters.balanced_only.then_some(config.balanced_edge_ratio),
            max_results: config.max_raw_cycles,
            max_steps: config.max_search_steps,
        }
    }

    /// Cycles through the graph's requester.
    pub fn find(&self, graph: &WantGraph) -> SearchOutcome {
        self.find_from(graph, graph.requester())
    }

    /// Cycles through `start`, each rotated so that `start` gives first.
    ///
    /// Output order follows the graph's stable edge order, so identical
    /// graphs give identical results.
    pub fn find_from(&self, graph: &WantGraph, start: &UserId) -> SearchOutcome {
        let component = match component_of(graph, start) {
            Some(c) if c.can_host_cycle(MIN_CYCLE_LENGTH) => c,
            _ => {
                log::debug!("{} is not in any component large enough for a cycle", start);
                return SearchOutcome::default();
            }
        };

        let mut search = Search {
            finder: self,
            graph,
            start,
            allowed: component.users.iter().collect(),
            path: Vec::new(),
            on_path: HashSet::new(),
            reference_value: None,
            outcome: SearchOutcome::default(),
        };
        search.on_path.insert(start);
        search.dfs(start, graph.trust(start));

        let outcome = search.outcome;
        log::debug!(
            "cycle search from {}: {} cycles in {} steps{}",
            start,
            outcome.cycles.len(),
            outcome.steps,
            if outcome.truncated { " (truncated)" } else { "" }
        );
        outcome
    }
}

struct Search<'g> {
    finder: &'g CycleFinder,
    graph: &'g WantGraph,
    start: &'g UserId,
    allowed: HashSet<&'g UserId>,
    path: Vec<&'g WantEdge>,
    on_path: HashSet<&'g UserId>,
    /// Value of the start user's item on the current path.
    reference_value: Option<Decimal>,
    outcome: SearchOutcome,
}

impl<'g> Search<'g> {
    fn halted(&self) -> bool {
        self.outcome.truncated
    }

    fn dfs(&mut self, current: &'g UserId, trust: f64) {
        let graph = self.graph;
        for edge in graph.outgoing(current) {
            if self.halted() {
                return;
            }
            if self.outcome.steps >= self.finder.max_steps {
                self.outcome.truncated = true;
                return;
            }
            self.outcome.steps += 1;

            if !self.allowed.contains(&edge.receiver) || !self.within_balance(edge) {
                continue;
            }

            if &edge.receiver == self.start {
                // Closing here yields path.len() + 1 participants.
                if self.path.len() + 1 >= MIN_CYCLE_LENGTH {
                    self.record(edge);
                }
                continue;
            }

            if self.on_path.contains(&edge.receiver) {
                continue;
            }
            // Extending adds a participant; leave room to close the loop.
            if self.path.len() + 2 > self.finder.max_len {
                continue;
            }
            let next_trust = trust * graph.trust(&edge.receiver);
            if next_trust < self.finder.trust_floor {
                continue;
            }

            let is_first = self.path.is_empty();
            if is_first {
                self.reference_value = Some(edge.value);
            }
            self.path.push(edge);
            self.on_path.insert(&edge.receiver);
            self.dfs(&edge.receiver, next_trust);
            self.on_path.remove(&edge.receiver);
            self.path.pop();
            if is_first {
                self.reference_value = None;
            }
        }
    }

    fn within_balance(&self, edge: &WantEdge) -> bool {
        let ratio = match self.finder.balanced_ratio {
            Some(r) => r,
            None => return true,
        };
        // The first edge is the start user's own item and defines the reference.
        let reference = match self.reference_value {
            Some(v) => v,
            None => return true,
        };
        (edge.value - reference).abs() <= reference * ratio
    }

    fn record(&mut self, closing: &'g WantEdge) {
        let mut edges: Vec<WantEdge> = self.path.iter().map(|e| (*e).clone()).collect();
        edges.push(closing.clone());
        self.outcome.cycles.push(RawCycle { edges });
        if self.outcome.cycles.len() >= self.finder.max_results {
            self.outcome.truncated = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::matcher::MatchKind;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn edge(from: &str, to: &str, value: Decimal) -> WantEdge {
        WantEdge {
            giver: from.into(),
            receiver: to.into(),
            item: format!("{}>{}", from, to).as_str().into(),
            value,
            kind: MatchKind::Exact,
            wanted: "any".into(),
        }
    }

    fn graph(edges: Vec<WantEdge>) -> WantGraph {
        let mut trust = HashMap::new();
        for e in &edges {
            trust.insert(e.giver.clone(), 1.0);
            trust.insert(e.receiver.clone(), 1.0);
        }
        WantGraph::from_edges("A".into(), edges, trust)
    }

    fn finder() -> CycleFinder {
        CycleFinder::from_config(&EngineConfig::default(), &OpportunityFilters::default())
    }

    #[test]
    fn test_simple_cycle() {
        let g = graph(vec![
            edge("A", "B", dec!(10)),
            edge("B", "C", dec!(10)),
            edge("C", "A", dec!(10)),
        ]);
        let outcome = finder().find(&g);
        assert_eq!(outcome.cycles.len(), 1);
        let cycle = &outcome.cycles[0];
        assert_eq!(cycle.len(), 3);
        assert!(cycle.is_closed());
        assert_eq!(cycle.users()[0].as_str(), "A");
        assert!(!outcome.truncated);
    }

    #[test]
    fn test_no_cycle() {
        let g = graph(vec![edge("A", "B", dec!(10)), edge("B", "C", dec!(10))]);
        assert!(finder().find(&g).cycles.is_empty());
    }

    #[test]
    fn test_two_cycles_are_not_swaps() {
        let g = graph(vec![edge("A", "B", dec!(10)), edge("B", "A", dec!(10))]);
        assert!(finder().find(&g).cycles.is_empty());
    }

    #[test]
    fn test_max_length_prunes() {
        let g = graph(vec![
            edge("A", "B", dec!(10)),
            edge("B", "C", dec!(10)),
            edge("C", "D", dec!(10)),
            edge("D", "A", dec!(10)),
        ]);
        let mut f = finder();
        assert_eq!(f.find(&g).cycles.len(), 1);
        f.max_len = 3;
        assert!(f.find(&g).cycles.is_empty());
    }

    #[test]
    fn test_trust_floor_prunes() {
        let edges = vec![
            edge("A", "B", dec!(10)),
            edge("B", "C", dec!(10)),
            edge("C", "A", dec!(10)),
        ];
        let mut trust = HashMap::new();
        trust.insert(UserId::new("A"), 1.0);
        trust.insert(UserId::new("B"), 0.4);
        trust.insert(UserId::new("C"), 0.4);
        let g = WantGraph::from_edges("A".into(), edges, trust);
        // 1.0 * 0.4 * 0.4 = 0.16 < 0.25
        assert!(finder().find(&g).cycles.is_empty());

        let mut f = finder();
        f.trust_floor = 0.1;
        assert_eq!(f.find(&g).cycles.len(), 1);
    }

    #[test]
    fn test_balanced_only_filter() {
        let g = graph(vec![
            edge("A", "B", dec!(100)),
            edge("B", "C", dec!(400)),
            edge("C", "A", dec!(100)),
        ]);
        let filters = OpportunityFilters {
            balanced_only: true,
            ..Default::default()
        };
        let f = CycleFinder::from_config(&EngineConfig::default(), &filters);
        assert!(f.find(&g).cycles.is_empty());
        assert_eq!(finder().find(&g).cycles.len(), 1);
    }

    #[test]
    fn test_rotation_starts_at_requester() {
        let g = graph(vec![
            edge("A", "B", dec!(10)),
            edge("B", "C", dec!(10)),
            edge("C", "A", dec!(10)),
        ]);
        let outcome = finder().find_from(&g, &"B".into());
        assert_eq!(outcome.cycles.len(), 1);
        assert_eq!(outcome.cycles[0].users()[0].as_str(), "B");
    }

    #[test]
    fn test_result_cap_truncates() {
        // A complete graph on 5 users has many cycles through A.
        let names = ["A", "B", "C", "D", "E"];
        let mut edges = Vec::new();
        for from in names {
            for to in names {
                if from != to {
                    edges.push(edge(from, to, dec!(10)));
                }
            }
        }
        let g = graph(edges);
        let mut f = finder();
        let all = f.find(&g);
        assert!(all.cycles.len() > 5);
        assert!(all.cycles.iter().all(|c| c.is_closed() && c.len() >= 3));

        f.max_results = 5;
        let capped = f.find(&g);
        assert_eq!(capped.cycles.len(), 5);
        assert!(capped.truncated);
    }

    #[test]
    fn test_step_budget_truncates() {
        let names = ["A", "B", "C", "D", "E"];
        let mut edges = Vec::new();
        for from in names {
            for to in names {
                if from != to {
                    edges.push(edge(from, to, dec!(10)));
                }
            }
        }
        let g = graph(edges);
        let mut f = finder();
        let full = f.find(&g);
        assert!(full.steps > 10);

        f.max_steps = 10;
        let budgeted = f.find(&g);
        assert!(budgeted.truncated);
        assert_eq!(budgeted.steps, 10);
        assert!(budgeted.cycles.len() < full.cycles.len());
        assert!(budgeted.cycles.iter().all(RawCycle::is_closed));
    }

    #[test]
    fn test_search_is_deterministic() {
        let names = ["A", "B", "C", "D"];
        let mut edges = Vec::new();
        for from in names {
            for to in names {
                if from != to {
                    edges.push(edge(from, to, dec!(10)));
                }
            }
        }
        let g = graph(edges);
        let a = finder().find(&g);
        let b = finder().find(&g);
        assert_eq!(a.cycles, b.cycles);
    }

    #[test]
    fn test_no_repeated_users() {
        let g = graph(vec![
            edge("A", "B", dec!(10)),
            edge("B", "C", dec!(10)),
            edge("C", "B", dec!(10)),
            edge("C", "A", dec!(10)),
        ]);
        for cycle in finder().find(&g).cycles {
            let users: HashSet<_> = cycle.users().into_iter().collect();
            assert_eq!(users.len(), cycle.len());
        }
    }
}
