use crate::core::config::MIN_CYCLE_LENGTH;
use crate::core::error::EngineError;
use crate::core::item::ItemId;
use crate::core::user::UserId;
use crate::multiswap::events::{ExpiredSwap, RejectionEvent, RejectionReason};
use crate::multiswap::state::{MultiSwap, MultiSwapStatus};
use crate::scoring::scorer::Opportunity;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Response to a successful `create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedSwap {
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmOutcome {
    pub all_confirmed: bool,
    /// The user had confirmed before; nothing changed.
    pub already_confirmed: bool,
    pub remaining_count: usize,
    pub status: MultiSwapStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectOutcome {
    pub swap_id: Uuid,
    pub opportunity_key: String,
    pub rejected_by: UserId,
    pub released_items: Vec<ItemId>,
    pub events: Vec<RejectionEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSwap {
    pub swap_id: Uuid,
    pub participants: Vec<UserId>,
    pub released_items: Vec<ItemId>,
}

/// Swap counts by status plus live reservations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub rejected: usize,
    pub expired: usize,
    pub active_reservations: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
    swaps: HashMap<Uuid, MultiSwap>,
    /// Item -> the active swap holding it.
    reservations: HashMap<ItemId, Uuid>,
}

impl RegistryState {
    fn swap_mut(&mut self, id: Uuid) -> Result<&mut MultiSwap, EngineError> {
        self.swaps.get_mut(&id).ok_or(EngineError::SwapNotFound(id))
    }

    fn release(&mut self, swap_id: Uuid, items: &[ItemId]) -> Vec<ItemId> {
        let mut released = Vec::with_capacity(items.len());
        for item in items {
            if self.reservations.get(item) == Some(&swap_id) {
                self.reservations.remove(item);
                released.push(item.clone());
            }
        }
        released
    }
}

/// Owner of every MultiSwap and of the per-item reservation map.
///
/// All mutations run under one lock, so the reservation check and the
/// reservation write in `create` are a single atomic step, and the first
/// terminal transition of a swap is the only one that succeeds.
///
/// Operations take `now` explicitly; the engine facade supplies it from its
/// clock.
#[derive(Debug, Default)]
pub struct MultiSwapRegistry {
    state: Mutex<RegistryState>,
}

impl MultiSwapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit an opportunity as a pending swap and reserve every participant's item.
    ///
    /// Fails without touching any state if the cycle is malformed or if any
    /// item is already held by another active swap.
    pub fn create(
        &self,
        opportunity: &Opportunity,
        initiator: &UserId,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<CreatedSwap, EngineError> {
        validate_cycle(opportunity, initiator)?;

        let mut state = self.state.lock();
        for node in &opportunity.nodes {
            if let Some(holder) = state.reservations.get(&node.gives.id) {
                log::warn!(
                    "create rejected: item {} already reserved by swap {}",
                    node.gives.id,
                    holder
                );
                return Err(EngineError::ItemReserved {
                    item: node.gives.id.clone(),
                    swap_id: *holder,
                });
            }
        }

        let swap = MultiSwap::from_opportunity(opportunity, initiator, now, window);
        let created = CreatedSwap {
            id: swap.id,
            expires_at: swap.expires_at,
        };
        for node in &opportunity.nodes {
            state.reservations.insert(node.gives.id.clone(), swap.id);
        }
        log::info!(
            "swap {} created by {} with {} participants, expires {}",
            swap.id,
            initiator,
            swap.participants.len(),
            swap.expires_at
        );
        state.swaps.insert(swap.id, swap);
        Ok(created)
    }

    /// Record a participant's confirmation.
    ///
    /// Confirming twice is a no-op. The last confirmation moves the swap to
    /// `confirmed` under the same lock as the flag update.
    pub fn confirm(
        &self,
        id: Uuid,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<ConfirmOutcome, EngineError> {
        let mut state = self.state.lock();
        let swap = state.swap_mut(id)?;
        check_actionable(swap, user, now)?;

        let participant = swap
            .participant_mut(user)
            .ok_or_else(|| EngineError::NotParticipant {
                id,
                user: user.clone(),
            })?;
        if participant.confirmed {
            return Ok(ConfirmOutcome {
                all_confirmed: false,
                already_confirmed: true,
                remaining_count: swap.remaining(),
                status: swap.status,
            });
        }
        participant.confirmed = true;
        participant.confirmed_at = Some(now);
        swap.touch(now);

        let all_confirmed = swap.all_confirmed();
        if all_confirmed {
            swap.transition(MultiSwapStatus::Confirmed, now)?;
            log::info!("swap {} fully confirmed", id);
        } else {
            log::debug!("swap {}: {} confirmed, {} remaining", id, user, swap.remaining());
        }
        Ok(ConfirmOutcome {
            all_confirmed,
            already_confirmed: false,
            remaining_count: swap.remaining(),
            status: swap.status,
        })
    }

    /// Void the whole cycle on behalf of one participant.
    ///
    /// Releases every reservation and emits one event per other participant.
    pub fn reject(
        &self,
        id: Uuid,
        user: &UserId,
        reason: Option<RejectionReason>,
        now: DateTime<Utc>,
    ) -> Result<RejectOutcome, EngineError> {
        let mut state = self.state.lock();
        let swap = state.swap_mut(id)?;
        check_actionable(swap, user, now)?;
        swap.transition(MultiSwapStatus::Rejected, now)?;

        let items = swap.items();
        let opportunity_key = swap.opportunity_key.clone();
        let orphaned: Vec<UserId> = swap
            .users()
            .into_iter()
            .filter(|u| u != user)
            .collect();
        let events = orphaned
            .iter()
            .map(|affected| RejectionEvent {
                swap_id: id,
                rejected_by: user.clone(),
                reason: reason.clone(),
                affected: affected.clone(),
                orphaned: orphaned.clone(),
                occurred_at: now,
            })
            .collect();

        let released_items = state.release(id, &items);
        log::warn!(
            "swap {} rejected by {} ({}), {} reservations released",
            id,
            user,
            reason.as_ref().map_or_else(|| "no reason".to_string(), |r| r.to_string()),
            released_items.len()
        );
        Ok(RejectOutcome {
            swap_id: id,
            opportunity_key,
            rejected_by: user.clone(),
            released_items,
            events,
        })
    }

    /// Expire every pending swap whose window has elapsed.
    ///
    /// Running it again with the same `now` finds nothing left to do.
    pub fn expire_due(&self, now: DateTime<Utc>) -> Vec<ExpiredSwap> {
        let mut state = self.state.lock();
        let mut due: Vec<Uuid> = state
            .swaps
            .values()
            .filter(|s| s.status == MultiSwapStatus::Pending && s.is_past_deadline(now))
            .map(|s| s.id)
            .collect();
        due.sort();

        let mut expired = Vec::with_capacity(due.len());
        for id in due {
            let (items, record) = match state.swaps.get_mut(&id) {
                Some(swap) => {
                    if swap.transition(MultiSwapStatus::Expired, now).is_err() {
                        continue;
                    }
                    let record = ExpiredSwap {
                        swap_id: id,
                        opportunity_key: swap.opportunity_key.clone(),
                        participants: swap.users(),
                        unconfirmed: swap.unconfirmed(),
                        released_items: Vec::new(),
                        expired_at: swap.expires_at,
                    };
                    (swap.items(), record)
                }
                None => continue,
            };
            let released_items = state.release(id, &items);
            log::warn!("swap {} expired, {} reservations released", id, released_items.len());
            expired.push(ExpiredSwap {
                released_items,
                ..record
            });
        }
        expired
    }

    /// Note that a notification went out to a participant. Never changes status.
    pub fn mark_notified(
        &self,
        id: Uuid,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let swap = state.swap_mut(id)?;
        let participant = swap
            .participant_mut(user)
            .ok_or_else(|| EngineError::NotParticipant {
                id,
                user: user.clone(),
            })?;
        participant.notified_at = Some(now);
        swap.touch(now);
        Ok(())
    }

    /// Hand a confirmed swap off to settlement and release its reservations.
    pub fn complete(&self, id: Uuid, now: DateTime<Utc>) -> Result<CompletedSwap, EngineError> {
        let mut state = self.state.lock();
        let swap = state.swap_mut(id)?;
        swap.transition(MultiSwapStatus::Completed, now)?;
        let participants = swap.users();
        let items = swap.items();
        let released_items = state.release(id, &items);
        log::info!("swap {} completed", id);
        Ok(CompletedSwap {
            swap_id: id,
            participants,
            released_items,
        })
    }

    pub fn get(&self, id: Uuid) -> Option<MultiSwap> {
        self.state.lock().swaps.get(&id).cloned()
    }

    /// Items currently locked by active swaps.
    pub fn reserved_items(&self) -> HashSet<ItemId> {
        self.state.lock().reservations.keys().cloned().collect()
    }

    /// The active swap holding an item, if any.
    pub fn reservation_of(&self, item: &ItemId) -> Option<Uuid> {
        self.state.lock().reservations.get(item).copied()
    }

    pub fn counts(&self) -> StatusCounts {
        let state = self.state.lock();
        let mut counts = StatusCounts {
            active_reservations: state.reservations.len(),
            ..Default::default()
        };
        for swap in state.swaps.values() {
            match swap.status {
                MultiSwapStatus::Pending => counts.pending += 1,
                MultiSwapStatus::Confirmed => counts.confirmed += 1,
                MultiSwapStatus::Completed => counts.completed += 1,
                MultiSwapStatus::Rejected => counts.rejected += 1,
                MultiSwapStatus::Expired => counts.expired += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.state.lock().swaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Checks that need no market data.
pub fn validate_cycle(opportunity: &Opportunity, initiator: &UserId) -> Result<(), EngineError> {
    let n = opportunity.nodes.len();
    if n < MIN_CYCLE_LENGTH {
        return Err(EngineError::TooFewParticipants {
            count: n,
            min: MIN_CYCLE_LENGTH,
        });
    }
    let mut users = HashSet::new();
    let mut items = HashSet::new();
    for node in &opportunity.nodes {
        if !users.insert(&node.user) {
            return Err(EngineError::DuplicateParticipant(node.user.clone()));
        }
        if !items.insert(&node.gives.id) {
            return Err(EngineError::DuplicateItem(node.gives.id.clone()));
        }
    }
    for i in 0..n {
        let next = &opportunity.nodes[(i + 1) % n];
        if next.receives != opportunity.nodes[i].gives.id {
            return Err(EngineError::BrokenLink {
                giver: opportunity.nodes[i].user.clone(),
                receiver: next.user.clone(),
            });
        }
    }
    if !users.contains(initiator) {
        return Err(EngineError::InitiatorNotParticipant(initiator.clone()));
    }
    Ok(())
}

/// Preconditions shared by confirm and reject.
fn check_actionable(swap: &MultiSwap, user: &UserId, now: DateTime<Utc>) -> Result<(), EngineError> {
    if swap.participant(user).is_none() {
        return Err(EngineError::NotParticipant {
            id: swap.id,
            user: user.clone(),
        });
    }
    if swap.status != MultiSwapStatus::Pending {
        return Err(EngineError::NotPending {
            id: swap.id,
            status: swap.status,
        });
    }
    if swap.is_past_deadline(now) {
        return Err(EngineError::Expired {
            id: swap.id,
            expired_at: swap.expires_at,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::matcher::MatchKind;
    use crate::scoring::scorer::{cycle_key, ItemSummary, QualityTier, SwapNode};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn node(user: &str, gives: &str, receives: &str) -> SwapNode {
        SwapNode {
            user: user.into(),
            gives: ItemSummary {
                id: gives.into(),
                title: String::new(),
                category: "any".into(),
                value: dec!(10),
                city: "Lyon".into(),
            },
            receives: receives.into(),
            wants: "any".into(),
            match_kind: MatchKind::Exact,
            trust_score: 100,
            city: "Lyon".into(),
            region: "ARA".into(),
        }
    }

    /// A gives X to B, B gives Y to C, C gives Z to A.
    fn opportunity(slots: &[(&str, &str)]) -> Opportunity {
        let n = slots.len();
        let nodes: Vec<SwapNode> = (0..n)
            .map(|i| node(slots[i].0, slots[i].1, slots[(i + n - 1) % n].1))
            .collect();
        Opportunity {
            key: cycle_key(nodes.iter().map(|node| (&node.user, &node.gives.id))),
            nodes,
            total_score: 1.0,
            is_value_balanced: true,
            max_value_deviation: Decimal::ZERO,
            value_balance_score: 1.0,
            trust_score: 1.0,
            location_score: 1.0,
            category_score: 1.0,
            tier: QualityTier::Excellent,
            discovered_at: Utc::now(),
        }
    }

    fn abc() -> Opportunity {
        opportunity(&[("A", "X"), ("B", "Y"), ("C", "Z")])
    }

    fn window() -> Duration {
        Duration::hours(48)
    }

    #[test]
    fn test_create_reserves_items() {
        let reg = MultiSwapRegistry::new();
        let now = Utc::now();
        let created = reg.create(&abc(), &"A".into(), now, window()).unwrap();
        assert_eq!(created.expires_at, now + window());
        assert_eq!(reg.reserved_items().len(), 3);
        assert_eq!(reg.reservation_of(&"Y".into()), Some(created.id));
        let swap = reg.get(created.id).unwrap();
        assert_eq!(swap.status, MultiSwapStatus::Pending);
        assert_eq!(swap.remaining(), 3);
    }

    #[test]
    fn test_create_rejects_short_cycle() {
        let reg = MultiSwapRegistry::new();
        let err = reg
            .create(&opportunity(&[("A", "X"), ("B", "Y")]), &"A".into(), Utc::now(), window())
            .unwrap_err();
        assert_eq!(err, EngineError::TooFewParticipants { count: 2, min: 3 });
        assert!(reg.is_empty());
    }

    #[test]
    fn test_create_rejects_broken_loop() {
        let mut opp = abc();
        opp.nodes[1].receives = "Q".into();
        let err = MultiSwapRegistry::new()
            .create(&opp, &"A".into(), Utc::now(), window())
            .unwrap_err();
        assert!(matches!(err, EngineError::BrokenLink { .. }));
    }

    #[test]
    fn test_create_requires_initiator_participant() {
        let err = MultiSwapRegistry::new()
            .create(&abc(), &"Q".into(), Utc::now(), window())
            .unwrap_err();
        assert_eq!(err, EngineError::InitiatorNotParticipant("Q".into()));
    }

    #[test]
    fn test_overlapping_create_conflicts() {
        let reg = MultiSwapRegistry::new();
        let now = Utc::now();
        let first = reg.create(&abc(), &"A".into(), now, window()).unwrap();
        let overlapping = opportunity(&[("D", "W"), ("B", "Y"), ("E", "V")]);
        let err = reg.create(&overlapping, &"D".into(), now, window()).unwrap_err();
        assert_eq!(
            err,
            EngineError::ItemReserved {
                item: "Y".into(),
                swap_id: first.id
            }
        );
        assert!(err.is_conflict());
        // Nothing from the failed attempt is reserved.
        assert!(reg.reservation_of(&"W".into()).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_same_user_different_item_is_fine() {
        let reg = MultiSwapRegistry::new();
        let now = Utc::now();
        reg.create(&abc(), &"A".into(), now, window()).unwrap();
        let other = opportunity(&[("A", "X2"), ("D", "W"), ("E", "V")]);
        assert!(reg.create(&other, &"A".into(), now, window()).is_ok());
    }

    #[test]
    fn test_confirm_all_transitions_once() {
        let reg = MultiSwapRegistry::new();
        let now = Utc::now();
        let id = reg.create(&abc(), &"A".into(), now, window()).unwrap().id;

        let a = reg.confirm(id, &"A".into(), now).unwrap();
        assert_eq!(a.remaining_count, 2);
        let again = reg.confirm(id, &"A".into(), now).unwrap();
        assert_eq!(again.remaining_count, 2);
        assert!(again.already_confirmed);
        assert!(!again.all_confirmed);

        reg.confirm(id, &"B".into(), now).unwrap();
        let last = reg.confirm(id, &"C".into(), now).unwrap();
        assert!(last.all_confirmed);
        assert_eq!(last.remaining_count, 0);
        assert_eq!(last.status, MultiSwapStatus::Confirmed);

        let err = reg.confirm(id, &"C".into(), now).unwrap_err();
        assert!(matches!(err, EngineError::NotPending { status: MultiSwapStatus::Confirmed, .. }));
        // Confirmed swaps keep their reservations.
        assert_eq!(reg.reserved_items().len(), 3);
    }

    #[test]
    fn test_confirm_preconditions() {
        let reg = MultiSwapRegistry::new();
        let now = Utc::now();
        let id = reg.create(&abc(), &"A".into(), now, window()).unwrap().id;

        assert_eq!(
            reg.confirm(Uuid::nil(), &"A".into(), now).unwrap_err(),
            EngineError::SwapNotFound(Uuid::nil())
        );
        assert!(matches!(
            reg.confirm(id, &"Q".into(), now).unwrap_err(),
            EngineError::NotParticipant { .. }
        ));
        assert!(matches!(
            reg.confirm(id, &"A".into(), now + Duration::hours(49)).unwrap_err(),
            EngineError::Expired { .. }
        ));
    }

    #[test]
    fn test_reject_releases_and_emits() {
        let reg = MultiSwapRegistry::new();
        let now = Utc::now();
        let id = reg.create(&abc(), &"A".into(), now, window()).unwrap().id;

        let outcome = reg
            .reject(id, &"B".into(), Some(RejectionReason::ChangedMind), now)
            .unwrap();
        assert_eq!(outcome.released_items.len(), 3);
        assert_eq!(outcome.events.len(), 2);
        let affected: Vec<&str> = outcome.events.iter().map(|e| e.affected.as_str()).collect();
        assert_eq!(affected, vec!["A", "C"]);
        assert!(outcome.events.iter().all(|e| e.rejected_by.as_str() == "B"));
        assert!(reg.reserved_items().is_empty());
        assert_eq!(reg.get(id).unwrap().status, MultiSwapStatus::Rejected);
    }

    #[test]
    fn test_reject_after_confirmed_fails() {
        let reg = MultiSwapRegistry::new();
        let now = Utc::now();
        let id = reg.create(&abc(), &"A".into(), now, window()).unwrap().id;
        for u in ["A", "B", "C"] {
            reg.confirm(id, &u.into(), now).unwrap();
        }
        assert!(reg.reject(id, &"B".into(), None, now).unwrap_err().is_conflict());
    }

    #[test]
    fn test_expire_is_idempotent() {
        let reg = MultiSwapRegistry::new();
        let now = Utc::now();
        let id = reg.create(&abc(), &"A".into(), now, window()).unwrap().id;
        reg.confirm(id, &"A".into(), now).unwrap();
        reg.confirm(id, &"B".into(), now).unwrap();

        let later = now + Duration::hours(48);
        let first = reg.expire_due(later);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].released_items.len(), 3);
        assert_eq!(first[0].unconfirmed, vec![UserId::new("C")]);
        let counts = reg.counts();

        assert!(reg.expire_due(later).is_empty());
        assert_eq!(reg.counts(), counts);
        assert_eq!(counts.expired, 1);
        assert_eq!(counts.active_reservations, 0);
    }

    #[test]
    fn test_expire_skips_fresh_and_confirmed() {
        let reg = MultiSwapRegistry::new();
        let now = Utc::now();
        let fresh = reg.create(&abc(), &"A".into(), now, window()).unwrap().id;
        let done = reg
            .create(&opportunity(&[("D", "W"), ("E", "V"), ("F", "U")]), &"D".into(), now, window())
            .unwrap()
            .id;
        for u in ["D", "E", "F"] {
            reg.confirm(done, &u.into(), now).unwrap();
        }
        assert!(reg.expire_due(now + Duration::hours(1)).is_empty());
        let expired = reg.expire_due(now + Duration::hours(72));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].swap_id, fresh);
        assert_eq!(reg.get(done).unwrap().status, MultiSwapStatus::Confirmed);
    }

    #[test]
    fn test_mark_notified_keeps_status() {
        let reg = MultiSwapRegistry::new();
        let now = Utc::now();
        let id = reg.create(&abc(), &"A".into(), now, window()).unwrap().id;
        reg.mark_notified(id, &"B".into(), now).unwrap();
        let swap = reg.get(id).unwrap();
        assert_eq!(swap.participant(&"B".into()).unwrap().notified_at, Some(now));
        assert_eq!(swap.status, MultiSwapStatus::Pending);
        assert!(reg.mark_notified(id, &"Q".into(), now).is_err());
    }

    #[test]
    fn test_complete_requires_confirmed() {
        let reg = MultiSwapRegistry::new();
        let now = Utc::now();
        let id = reg.create(&abc(), &"A".into(), now, window()).unwrap().id;
        assert!(reg.complete(id, now).is_err());
        for u in ["A", "B", "C"] {
            reg.confirm(id, &u.into(), now).unwrap();
        }
        let done = reg.complete(id, now).unwrap();
        assert_eq!(done.released_items.len(), 3);
        assert_eq!(reg.get(id).unwrap().status, MultiSwapStatus::Completed);
        assert!(reg.complete(id, now).is_err());
    }

    #[test]
    fn test_version_increases() {
        let reg = MultiSwapRegistry::new();
        let now = Utc::now();
        let id = reg.create(&abc(), &"A".into(), now, window()).unwrap().id;
        let v0 = reg.get(id).unwrap().version;
        reg.confirm(id, &"A".into(), now).unwrap();
        assert!(reg.get(id).unwrap().version > v0);
    }
}
