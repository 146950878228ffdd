//! Alternative search for participants orphaned by a failed swap.
//!
//! Reuses the graph builder, cycle finder and scorer unchanged; the only
//! differences from a regular request are the excluded users and the
//! failed cycle itself.

use crate::core::config::EngineConfig;
use crate::core::item::ItemId;
use crate::core::snapshot::MarketSnapshot;
use crate::core::user::UserId;
use crate::graph::cycle_finder::CycleFinder;
use crate::graph::want_graph::{OpportunityFilters, WantGraph};
use crate::scoring::scorer::{CycleScorer, Opportunity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Alternatives found for one orphaned participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescueProposal {
    pub user: UserId,
    pub opportunities: Vec<Opportunity>,
}

impl RescueProposal {
    pub fn is_empty(&self) -> bool {
        self.opportunities.is_empty()
    }
}

/// What to leave out of a rescue search.
#[derive(Debug, Clone, Default)]
pub struct RescueScope {
    /// Users that may not appear in any alternative.
    pub excluded_users: HashSet<UserId>,
    /// `(user, item)` slots of the failed cycle; an alternative with exactly
    /// these slots, in any rotation, is the failed cycle again.
    pub failed_slots: BTreeSet<(UserId, ItemId)>,
    /// Items still held by active swaps.
    pub reserved: HashSet<ItemId>,
}

impl RescueScope {
    fn is_failed_cycle(&self, opportunity: &Opportunity) -> bool {
        if self.failed_slots.is_empty() || opportunity.len() != self.failed_slots.len() {
            return false;
        }
        opportunity
            .nodes
            .iter()
            .all(|n| self.failed_slots.contains(&(n.user.clone(), n.gives.id.clone())))
    }
}

/// Best-effort alternative search.
#[derive(Debug, Clone)]
pub struct RescueSearch {
    config: EngineConfig,
}

impl RescueSearch {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Up to `max_alternatives` opportunities for each affected user.
    ///
    /// Users with nothing on offer get an empty proposal rather than an
    /// error.
    pub fn rescue_all(
        &self,
        snapshot: &MarketSnapshot,
        affected: &[UserId],
        scope: &RescueScope,
        now: DateTime<Utc>,
    ) -> Vec<RescueProposal> {
        let scoped = exclude_users(snapshot, &scope.excluded_users);
        affected
            .iter()
            .filter(|u| !scope.excluded_users.contains(*u))
            .map(|user| RescueProposal {
                user: user.clone(),
                opportunities: self.search(&scoped, user, scope, now),
            })
            .collect()
    }

    /// Alternatives for a single user.
    pub fn alternatives_for(
        &self,
        snapshot: &MarketSnapshot,
        user: &UserId,
        scope: &RescueScope,
        now: DateTime<Utc>,
    ) -> Vec<Opportunity> {
        if scope.excluded_users.contains(user) {
            return Vec::new();
        }
        let scoped = exclude_users(snapshot, &scope.excluded_users);
        self.search(&scoped, user, scope, now)
    }

    fn search(
        &self,
        snapshot: &MarketSnapshot,
        user: &UserId,
        scope: &RescueScope,
        now: DateTime<Utc>,
    ) -> Vec<Opportunity> {
        if snapshot.user(user).is_none() {
            return Vec::new();
        }
        let filters = OpportunityFilters::default();
        let graph = WantGraph::build(snapshot, user, &filters, &self.config, &scope.reserved);
        let raw = CycleFinder::from_config(&self.config, &filters).find(&graph);
        let mut found: Vec<Opportunity> = CycleScorer::from_config(&self.config)
            .score_all(snapshot, &raw.cycles, now)
            .into_iter()
            .filter(|o| !scope.is_failed_cycle(o))
            .collect();
        found.truncate(self.config.max_alternatives);
        log::debug!("rescue for {}: {} alternatives", user, found.len());
        found
    }
}

/// Copy of the snapshot where excluded users are suspended, so the graph
/// builder drops them along with their items and wants.
fn exclude_users(snapshot: &MarketSnapshot, excluded: &HashSet<UserId>) -> MarketSnapshot {
    let mut scoped = snapshot.clone();
    for id in excluded {
        if let Some(profile) = snapshot.user(id) {
            scoped.add_user(profile.clone().suspended());
        }
    }
    scoped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::{Item, Want};
    use crate::core::user::UserProfile;
    use rust_decimal_macros::dec;

    /// a, b, c form a triangle; a, b, d form a second one through b's
    /// spare item.
    fn market() -> MarketSnapshot {
        let mut snap = MarketSnapshot::new();
        for u in ["a", "b", "c", "d"] {
            snap.add_user(UserProfile::new(u, 100, "Lyon", "ARA"));
        }
        snap.add_item(Item::new("x", "a", "books", dec!(20), "Lyon"));
        snap.add_item(Item::new("y", "b", "games", dec!(20), "Lyon"));
        snap.add_item(Item::new("y2", "b", "tools", dec!(20), "Lyon"));
        snap.add_item(Item::new("z", "c", "music", dec!(20), "Lyon"));
        snap.add_item(Item::new("w", "d", "music", dec!(20), "Lyon"));
        snap.add_want(Want::new("b", "books"));
        snap.add_want(Want::new("c", "games"));
        snap.add_want(Want::new("d", "tools"));
        snap.add_want(Want::new("a", "music"));
        snap
    }

    #[test]
    fn test_excluded_user_never_appears() {
        let snap = market();
        let scope = RescueScope {
            excluded_users: ["c".into()].into_iter().collect(),
            ..Default::default()
        };
        let alts = RescueSearch::new(&EngineConfig::default()).alternatives_for(
            &snap,
            &"a".into(),
            &scope,
            Utc::now(),
        );
        assert_eq!(alts.len(), 1);
        assert!(!alts[0].contains_user(&"c".into()));
        assert!(alts[0].contains_user(&"d".into()));
    }

    #[test]
    fn test_failed_cycle_is_skipped() {
        let snap = market();
        let scope = RescueScope {
            failed_slots: [("a", "x"), ("b", "y"), ("c", "z")]
                .iter()
                .map(|(u, i)| (UserId::new(*u), ItemId::new(*i)))
                .collect(),
            ..Default::default()
        };
        let alts = RescueSearch::new(&EngineConfig::default()).alternatives_for(
            &snap,
            &"b".into(),
            &scope,
            Utc::now(),
        );
        assert_eq!(alts.len(), 1);
        assert_eq!(alts[0].key, "b:y2>d:w>a:x");
    }

    #[test]
    fn test_empty_is_not_an_error() {
        let snap = market();
        let scope = RescueScope {
            excluded_users: ["b".into()].into_iter().collect(),
            ..Default::default()
        };
        let proposals = RescueSearch::new(&EngineConfig::default()).rescue_all(
            &snap,
            &["a".into(), "c".into()],
            &scope,
            Utc::now(),
        );
        assert_eq!(proposals.len(), 2);
        assert!(proposals.iter().all(RescueProposal::is_empty));
    }

    #[test]
    fn test_alternatives_capped() {
        let config = EngineConfig {
            max_alternatives: 1,
            ..Default::default()
        };
        let alts = RescueSearch::new(&config).alternatives_for(
            &market(),
            &"a".into(),
            &RescueScope::default(),
            Utc::now(),
        );
        assert_eq!(alts.len(), 1);
    }
}
