//! The orchestration facade: the only entry point external callers use.

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::EngineConfig;
use crate::core::error::EngineError;
use crate::core::item::ItemId;
use crate::core::snapshot::MarketSnapshot;
use crate::core::user::UserId;
use crate::graph::cycle_finder::CycleFinder;
use crate::graph::matcher::MatcherChain;
use crate::graph::want_graph::{OpportunityFilters, WantGraph};
use crate::market::{Marketplace, Notifier};
use crate::multiswap::events::{ExpiredSwap, RejectionEvent, RejectionReason, SwapNotification};
use crate::multiswap::registry::{
    validate_cycle, CompletedSwap, ConfirmOutcome, CreatedSwap, MultiSwapRegistry, StatusCounts,
};
use crate::multiswap::state::MultiSwap;
use crate::rescue::{RescueProposal, RescueScope, RescueSearch};
use crate::scoring::scorer::{CycleScorer, Opportunity};
use crate::scoring::stats::OpportunityStats;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Response of `find_opportunities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityReport {
    pub requester: UserId,
    /// Best first, capped at `max_opportunities`.
    pub opportunities: Vec<Opportunity>,
    /// Computed over every scored cycle, before the cap.
    pub stats: OpportunityStats,
    /// The search budget ran out before the graph was exhausted.
    pub truncated: bool,
}

/// Response of `reject`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectResponse {
    pub swap_id: Uuid,
    pub affected_participants: Vec<UserId>,
    pub events: Vec<RejectionEvent>,
    pub alternatives: Vec<RescueProposal>,
}

/// Response of `expire_old_multi_swaps`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpirySweep {
    pub expired: Vec<ExpiredSwap>,
    pub alternatives: Vec<RescueProposal>,
}

impl ExpirySweep {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty()
    }
}

/// Aggregate counters for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub searches: u64,
    pub cycles_discovered: u64,
    pub swaps_created: u64,
    pub alternatives_proposed: u64,
    pub pending: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub rejected: usize,
    pub expired: usize,
    pub active_reservations: usize,
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Engine Stats ===")?;
        writeln!(f, "Searches:          {}", self.searches)?;
        writeln!(f, "Cycles discovered: {}", self.cycles_discovered)?;
        writeln!(f, "Swaps created:     {}", self.swaps_created)?;
        writeln!(f, "Alternatives:      {}", self.alternatives_proposed)?;
        writeln!(
            f,
            "Swaps by status:   {} pending / {} confirmed / {} completed / {} rejected / {} expired",
            self.pending, self.confirmed, self.completed, self.rejected, self.expired
        )?;
        writeln!(f, "Reserved items:    {}", self.active_reservations)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Counters {
    searches: AtomicU64,
    cycles_discovered: AtomicU64,
    swaps_created: AtomicU64,
    alternatives_proposed: AtomicU64,
}

/// Multi-party swap engine.
///
/// Discovery is read-only and can run concurrently with anything. All state
/// changes go through the registry, which serialises them per call.
/// Pending swaps past their window are expired lazily whenever
/// opportunities are requested, or explicitly via `expire_old_multi_swaps`.
///
/// # Examples
///
/// ```
/// use multiswap_engine::prelude::*;
/// use rust_decimal_macros::dec;
/// use std::sync::Arc;
///
/// let mut snap = MarketSnapshot::new();
/// for (user, item, category, wants) in [
///     ("ana", "bike", "bikes", "books"),
///     ("ben", "lamp", "lamps", "bikes"),
///     ("cy", "novel", "books", "lamps"),
/// ] {
///     snap.add_user(UserProfile::new(user, 100, "Lyon", "ARA"));
///     snap.add_item(Item::new(item, user, category, dec!(40), "Lyon"));
///     snap.add_want(Want::new(user, wants));
/// }
///
/// let engine = SwapEngine::new(
///     EngineConfig::default(),
///     Arc::new(InMemoryMarketplace::new(snap)),
///     Arc::new(LogNotifier),
/// )
/// .unwrap();
///
/// let report = engine
///     .find_opportunities(&UserId::new("ana"), &OpportunityFilters::default())
///     .unwrap();
/// assert_eq!(report.opportunities.len(), 1);
///
/// let swap = engine
///     .create_multi_swap(&report.opportunities[0], &UserId::new("ana"))
///     .unwrap();
/// for user in ["ana", "ben", "cy"] {
///     engine.confirm(swap.id, &UserId::new(user)).unwrap();
/// }
/// assert_eq!(engine.stats().confirmed, 1);
/// ```
pub struct SwapEngine {
    config: EngineConfig,
    market: Arc<dyn Marketplace>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    matchers: MatcherChain,
    registry: MultiSwapRegistry,
    counters: Counters,
}

impl fmt::Debug for SwapEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwapEngine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl SwapEngine {
    pub fn new(
        config: EngineConfig,
        market: Arc<dyn Marketplace>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            market,
            notifier,
            clock: Arc::new(SystemClock),
            matchers: MatcherChain::default(),
            registry: MultiSwapRegistry::new(),
            counters: Counters::default(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_matchers(mut self, matchers: MatcherChain) -> Self {
        self.matchers = matchers;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scored swap cycles that include `user`, best first.
    pub fn find_opportunities(
        &self,
        user: &UserId,
        filters: &OpportunityFilters,
    ) -> Result<OpportunityReport, EngineError> {
        self.expire_old_multi_swaps();

        let snapshot = self.market.snapshot();
        let profile = snapshot
            .user(user)
            .ok_or_else(|| EngineError::UnknownUser(user.clone()))?;
        if profile.suspended {
            return Err(EngineError::UserSuspended(user.clone()));
        }

        let now = self.clock.now();
        let reserved = self.registry.reserved_items();
        let graph = WantGraph::build_with(
            &snapshot,
            user,
            filters,
            &self.config,
            &reserved,
            &self.matchers,
        );
        let outcome = CycleFinder::from_config(&self.config, filters).find(&graph);
        let mut opportunities =
            CycleScorer::from_config(&self.config).score_all(&snapshot, &outcome.cycles, now);
        let stats = OpportunityStats::from_opportunities(&opportunities);
        opportunities.truncate(self.config.max_opportunities);

        self.counters.searches.fetch_add(1, Ordering::Relaxed);
        self.counters
            .cycles_discovered
            .fetch_add(stats.total as u64, Ordering::Relaxed);
        log::info!(
            "{} opportunities for {} ({} returned{})",
            stats.total,
            user,
            opportunities.len(),
            if outcome.truncated { ", search truncated" } else { "" }
        );

        Ok(OpportunityReport {
            requester: user.clone(),
            opportunities,
            stats,
            truncated: outcome.truncated,
        })
    }

    /// Commit an opportunity and invite its participants.
    ///
    /// The opportunity is re-checked against the current market first, since
    /// listings may have changed since it was discovered.
    pub fn create_multi_swap(
        &self,
        opportunity: &Opportunity,
        initiator: &UserId,
    ) -> Result<CreatedSwap, EngineError> {
        validate_cycle(opportunity, initiator)?;
        let snapshot = self.market.snapshot();
        self.validate_against_market(&snapshot, opportunity)?;

        let now = self.clock.now();
        let window = self.config.confirmation_window();
        let created = self.registry.create(opportunity, initiator, now, window)?;
        self.counters.swaps_created.fetch_add(1, Ordering::Relaxed);

        for node in &opportunity.nodes {
            self.mirror_reservation(&node.gives.id, true);
        }

        let invite = SwapNotification::Invited {
            swap_id: created.id,
            initiator: initiator.clone(),
            expires_at: created.expires_at,
        };
        for node in opportunity.nodes.iter().filter(|n| &n.user != initiator) {
            self.notifier.notify(&node.user, &invite);
            if let Err(e) = self.registry.mark_notified(created.id, &node.user, now) {
                log::warn!("could not record invite to {} on swap {}: {}", node.user, created.id, e);
            }
        }
        Ok(created)
    }

    pub fn confirm(&self, id: Uuid, user: &UserId) -> Result<ConfirmOutcome, EngineError> {
        let outcome = self.registry.confirm(id, user, self.clock.now())?;
        if outcome.already_confirmed {
            return Ok(outcome);
        }
        if let Some(swap) = self.registry.get(id) {
            let notification = if outcome.all_confirmed {
                SwapNotification::AllConfirmed { swap_id: id }
            } else {
                SwapNotification::ParticipantConfirmed {
                    swap_id: id,
                    user: user.clone(),
                    remaining: outcome.remaining_count,
                }
            };
            self.broadcast(&swap.users(), &notification);
        }
        Ok(outcome)
    }

    /// Void the swap and look for alternatives for everyone else in it.
    pub fn reject(
        &self,
        id: Uuid,
        user: &UserId,
        reason: Option<RejectionReason>,
    ) -> Result<RejectResponse, EngineError> {
        let now = self.clock.now();
        let outcome = self.registry.reject(id, user, reason.clone(), now)?;
        self.release_in_market(&outcome.released_items);

        let affected: Vec<UserId> = outcome.events.iter().map(|e| e.affected.clone()).collect();
        self.broadcast(
            &affected,
            &SwapNotification::Rejected {
                swap_id: id,
                by: user.clone(),
                reason,
            },
        );

        let mut scope = self.rescue_scope(id);
        scope.excluded_users.insert(user.clone());
        let alternatives = self.rescue(id, &affected, &scope);

        Ok(RejectResponse {
            swap_id: id,
            affected_participants: affected,
            events: outcome.events,
            alternatives,
        })
    }

    /// Expire pending swaps past their window and rescue the participants
    /// who did confirm. Running it again at the same instant does nothing.
    pub fn expire_old_multi_swaps(&self) -> ExpirySweep {
        let expired = self.registry.expire_due(self.clock.now());
        if expired.is_empty() {
            return ExpirySweep::default();
        }

        let mut alternatives = Vec::new();
        for swap in &expired {
            self.release_in_market(&swap.released_items);
            self.broadcast(
                &swap.participants,
                &SwapNotification::Expired {
                    swap_id: swap.swap_id,
                },
            );

            let mut scope = self.rescue_scope(swap.swap_id);
            scope.excluded_users.extend(swap.unconfirmed.iter().cloned());
            let confirmed: Vec<UserId> = swap
                .participants
                .iter()
                .filter(|u| !swap.unconfirmed.contains(u))
                .cloned()
                .collect();
            alternatives.extend(self.rescue(swap.swap_id, &confirmed, &scope));
        }
        ExpirySweep {
            expired,
            alternatives,
        }
    }

    /// Hand a fully confirmed swap off to delivery.
    pub fn complete(&self, id: Uuid) -> Result<CompletedSwap, EngineError> {
        let done = self.registry.complete(id, self.clock.now())?;
        for item in &done.released_items {
            if let Err(e) = self.market.retire_item(item) {
                log::warn!("could not retire traded item {}: {}", item, e);
            }
        }
        self.broadcast(&done.participants, &SwapNotification::Completed { swap_id: id });
        Ok(done)
    }

    pub fn mark_participant_notified(&self, id: Uuid, user: &UserId) -> Result<(), EngineError> {
        self.registry.mark_notified(id, user, self.clock.now())
    }

    pub fn get(&self, id: Uuid) -> Option<MultiSwap> {
        self.registry.get(id)
    }

    /// Counters and per-status totals. Sweeps overdue swaps first so the
    /// totals never show an expired swap as pending.
    pub fn stats(&self) -> EngineStats {
        self.expire_old_multi_swaps();
        let StatusCounts {
            pending,
            confirmed,
            completed,
            rejected,
            expired,
            active_reservations,
        } = self.registry.counts();
        EngineStats {
            searches: self.counters.searches.load(Ordering::Relaxed),
            cycles_discovered: self.counters.cycles_discovered.load(Ordering::Relaxed),
            swaps_created: self.counters.swaps_created.load(Ordering::Relaxed),
            alternatives_proposed: self.counters.alternatives_proposed.load(Ordering::Relaxed),
            pending,
            confirmed,
            completed,
            rejected,
            expired,
            active_reservations,
        }
    }

    fn validate_against_market(
        &self,
        snapshot: &MarketSnapshot,
        opportunity: &Opportunity,
    ) -> Result<(), EngineError> {
        let n = opportunity.nodes.len();
        for node in &opportunity.nodes {
            let profile = snapshot
                .user(&node.user)
                .ok_or_else(|| EngineError::UnknownUser(node.user.clone()))?;
            if profile.suspended {
                return Err(EngineError::UserSuspended(node.user.clone()));
            }
            let item = snapshot
                .item(&node.gives.id)
                .ok_or_else(|| EngineError::UnknownItem(node.gives.id.clone()))?;
            if item.owner != node.user {
                return Err(EngineError::ItemNotOwned {
                    item: item.id.clone(),
                    user: node.user.clone(),
                });
            }
            if !item.active {
                return Err(EngineError::ItemUnavailable(item.id.clone()));
            }
        }

        for i in 0..n {
            let giver = &opportunity.nodes[i];
            let receiver = &opportunity.nodes[(i + 1) % n];
            let still_wanted = snapshot.item(&giver.gives.id).and_then(|item| {
                self.matchers
                    .best_against(item, snapshot.wants_of(&receiver.user), snapshot.taxonomy())
            });
            if still_wanted.is_none() {
                return Err(EngineError::BrokenLink {
                    giver: giver.user.clone(),
                    receiver: receiver.user.clone(),
                });
            }
        }
        Ok(())
    }

    fn rescue_scope(&self, failed: Uuid) -> RescueScope {
        let failed_slots = self
            .registry
            .get(failed)
            .map(|swap| {
                swap.participants
                    .iter()
                    .map(|p| (p.user().clone(), p.gives().clone()))
                    .collect()
            })
            .unwrap_or_default();
        RescueScope {
            excluded_users: HashSet::new(),
            failed_slots,
            reserved: self.registry.reserved_items(),
        }
    }

    fn rescue(&self, failed: Uuid, users: &[UserId], scope: &RescueScope) -> Vec<RescueProposal> {
        if users.is_empty() {
            return Vec::new();
        }
        let snapshot = self.market.snapshot();
        let proposals = RescueSearch::new(&self.config).rescue_all(
            &snapshot,
            users,
            scope,
            self.clock.now(),
        );
        for proposal in proposals.iter().filter(|p| !p.is_empty()) {
            self.counters
                .alternatives_proposed
                .fetch_add(proposal.opportunities.len() as u64, Ordering::Relaxed);
            self.notifier.notify(
                &proposal.user,
                &SwapNotification::AlternativesFound {
                    swap_id: failed,
                    count: proposal.opportunities.len(),
                },
            );
        }
        proposals
    }

    fn broadcast(&self, users: &[UserId], notification: &SwapNotification) {
        for user in users {
            self.notifier.notify(user, notification);
        }
    }

    fn release_in_market(&self, items: &[ItemId]) {
        for item in items {
            self.mirror_reservation(item, false);
        }
    }

    /// The registry is the source of truth for reservations; the market
    /// flag is a mirror, so a failed write is logged and not propagated.
    fn mirror_reservation(&self, item: &ItemId, reserved: bool) {
        if let Err(e) = self.market.set_item_reserved(item, reserved) {
            log::warn!("could not mirror reservation of {} to the market: {}", item, e);
        }
    }
}
