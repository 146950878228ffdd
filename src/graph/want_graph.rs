use crate::core::category::Category;
use crate::core::config::EngineConfig;
use crate::core::item::{ItemId, Want};
use crate::core::snapshot::MarketSnapshot;
use crate::core::user::{UserId, UserProfile};
use crate::graph::matcher::{MatchKind, MatcherChain};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Per-request search filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpportunityFilters {
    /// Only cycles in which the requester receives an item of this category
    /// (or one of its sub-categories).
    pub category: Option<Category>,
    /// Raise the trust threshold above the configured minimum.
    pub min_trust_score: Option<u8>,
    /// Only cycles whose items are all close in value to the requester's item.
    pub balanced_only: bool,
    /// Shorter cycle cap for this request; never above the configured maximum.
    pub max_cycle_length: Option<usize>,
}

/// A directed "who can give what to whom" edge.
///
/// `giver` owns `item`, and `item` satisfies one of `receiver`'s wants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WantEdge {
    pub giver: UserId,
    pub receiver: UserId,
    pub item: ItemId,
    pub value: Decimal,
    pub kind: MatchKind,
    /// The receiver's want this item satisfies.
    pub wanted: Category,
}

/// The want/offer graph for one request.
///
/// Nodes are users, keyed by id; full profiles and listings stay in the
/// snapshot and are only resolved when an opportunity is materialised.
/// Outgoing edges are kept sorted by `(receiver, item)` so traversal order,
/// and therefore search output, is reproducible.
///
/// # Examples
///
/// ```
/// use multiswap_engine::prelude::*;
/// use rust_decimal_macros::dec;
/// use std::collections::HashSet;
///
/// let mut snap = MarketSnapshot::new();
/// for u in ["a", "b"] {
///     snap.add_user(UserProfile::new(u, 90, "Lyon", "ARA"));
/// }
/// snap.add_item(Item::new("book", "a", "books", dec!(10), "Lyon"));
/// snap.add_want(Want::new("b", "books"));
///
/// let graph = WantGraph::build(
///     &snap,
///     &UserId::new("a"),
///     &OpportunityFilters::default(),
///     &EngineConfig::default(),
///     &HashSet::new(),
/// );
/// assert_eq!(graph.edge_count(), 1);
/// assert!(graph.has_edge(&UserId::new("a"), &UserId::new("b")));
/// ```
#[derive(Debug, Clone)]
pub struct WantGraph {
    requester: UserId,
    adjacency: BTreeMap<UserId, Vec<WantEdge>>,
    trust: HashMap<UserId, f64>,
}

impl WantGraph {
    /// Build the graph with the default matcher chain.
    pub fn build(
        snapshot: &MarketSnapshot,
        requester: &UserId,
        filters: &OpportunityFilters,
        config: &EngineConfig,
        reserved: &HashSet<ItemId>,
    ) -> Self {
        Self::build_with(
            snapshot,
            requester,
            filters,
            config,
            reserved,
            &MatcherChain::default(),
        )
    }

    /// Build the graph with an explicit matcher chain.
    ///
    /// Items that are inactive, flagged reserved, or present in `reserved`
    /// are left out, as are suspended users and users below the trust
    /// threshold. The requester is exempt from the trust threshold.
    pub fn build_with(
        snapshot: &MarketSnapshot,
        requester: &UserId,
        filters: &OpportunityFilters,
        config: &EngineConfig,
        reserved: &HashSet<ItemId>,
        matchers: &MatcherChain,
    ) -> Self {
        let min_trust = filters
            .min_trust_score
            .unwrap_or(0)
            .max(config.min_trust_score);

        let eligible: BTreeMap<&UserId, &UserProfile> = snapshot
            .users()
            .iter()
            .filter(|u| !u.suspended)
            .filter(|u| &u.id == requester || u.trust_score >= min_trust)
            .map(|u| (&u.id, u))
            .collect();

        let mut wants_by_user: HashMap<&UserId, Vec<&Want>> = HashMap::new();
        for want in snapshot.wants() {
            if eligible.contains_key(&want.user) {
                wants_by_user.entry(&want.user).or_default().push(want);
            }
        }

        let mut items: Vec<_> = snapshot
            .items()
            .iter()
            .filter(|it| it.is_available() && !reserved.contains(&it.id))
            .filter(|it| eligible.contains_key(&it.owner))
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));

        let taxonomy = snapshot.taxonomy();
        let mut adjacency: BTreeMap<UserId, Vec<WantEdge>> = BTreeMap::new();
        for id in eligible.keys() {
            adjacency.entry((*id).clone()).or_default();
        }

        for item in items {
            for (receiver, wants) in &wants_by_user {
                if *receiver == &item.owner {
                    continue;
                }
                if *receiver == requester {
                    if let Some(category) = &filters.category {
                        if &item.category != category && !taxonomy.is_ancestor(category, &item.category) {
                            continue;
                        }
                    }
                }
                if let Some((kind, want)) =
                    matchers.best_against(item, wants.iter().copied(), taxonomy)
                {
                    adjacency.entry(item.owner.clone()).or_default().push(WantEdge {
                        giver: item.owner.clone(),
                        receiver: (*receiver).clone(),
                        item: item.id.clone(),
                        value: item.value,
                        kind,
                        wanted: want.category.clone(),
                    });
                }
            }
        }

        for edges in adjacency.values_mut() {
            edges.sort_by(|a, b| a.receiver.cmp(&b.receiver).then_with(|| a.item.cmp(&b.item)));
        }

        let trust = eligible
            .iter()
            .map(|(id, u)| ((*id).clone(), u.normalized_trust()))
            .collect();

        log::debug!(
            "want graph for {}: {} users, {} edges",
            requester,
            adjacency.len(),
            adjacency.values().map(Vec::len).sum::<usize>()
        );

        Self {
            requester: requester.clone(),
            adjacency,
            trust,
        }
    }

    /// Assemble a graph from explicit edges, e.g. for tests.
    pub fn from_edges(
        requester: UserId,
        edges: Vec<WantEdge>,
        trust: HashMap<UserId, f64>,
    ) -> Self {
        let mut adjacency: BTreeMap<UserId, Vec<WantEdge>> = BTreeMap::new();
        for user in trust.keys() {
            adjacency.entry(user.clone()).or_default();
        }
        for edge in edges {
            adjacency.entry(edge.receiver.clone()).or_default();
            adjacency.entry(edge.giver.clone()).or_default().push(edge);
        }
        for edges in adjacency.values_mut() {
            edges.sort_by(|a, b| a.receiver.cmp(&b.receiver).then_with(|| a.item.cmp(&b.item)));
        }
        Self {
            requester,
            adjacency,
            trust,
        }
    }

    pub fn requester(&self) -> &UserId {
        &self.requester
    }

    /// Number of users that survived filtering.
    pub fn user_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edge_count() == 0
    }

    /// Users in the graph, in id order.
    pub fn users(&self) -> impl Iterator<Item = &UserId> {
        self.adjacency.keys()
    }

    /// Outgoing edges of a user, sorted by `(receiver, item)`.
    pub fn outgoing(&self, user: &UserId) -> &[WantEdge] {
        self.adjacency.get(user).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Any edge from `giver` to `receiver`.
    pub fn has_edge(&self, giver: &UserId, receiver: &UserId) -> bool {
        self.outgoing(giver).iter().any(|e| &e.receiver == receiver)
    }

    /// The edge carrying a specific item from `giver` to `receiver`.
    pub fn edge(&self, giver: &UserId, receiver: &UserId, item: &ItemId) -> Option<&WantEdge> {
        self.outgoing(giver)
            .iter()
            .find(|e| &e.receiver == receiver && &e.item == item)
    }

    /// Normalised trust of a user; unknown users count as untrusted.
    pub fn trust(&self, user: &UserId) -> f64 {
        self.trust.get(user).copied().unwrap_or(0.0)
    }
}
