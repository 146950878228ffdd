use crate::core::error::EngineError;
use crate::core::item::ItemId;
use crate::core::user::UserId;
use crate::scoring::scorer::{Opportunity, SwapNode};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a committed cycle.
///
/// ```text
/// pending ──► confirmed ──► completed
///    │
///    ├──► rejected
///    └──► expired
/// ```
///
/// Every transition is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiSwapStatus {
    Pending,
    Confirmed,
    Completed,
    Rejected,
    Expired,
}

impl MultiSwapStatus {
    /// Active swaps hold reservations on their participants' items.
    pub fn is_active(self) -> bool {
        matches!(self, MultiSwapStatus::Pending | MultiSwapStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn can_transition_to(self, next: MultiSwapStatus) -> bool {
        use MultiSwapStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Rejected) | (Pending, Expired) | (Confirmed, Completed)
        )
    }
}

impl fmt::Display for MultiSwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MultiSwapStatus::Pending => "pending",
            MultiSwapStatus::Confirmed => "confirmed",
            MultiSwapStatus::Completed => "completed",
            MultiSwapStatus::Rejected => "rejected",
            MultiSwapStatus::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

/// A participant's slot plus their confirmation bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub node: SwapNode,
    pub confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub notified_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn user(&self) -> &UserId {
        &self.node.user
    }

    pub fn gives(&self) -> &ItemId {
        &self.node.gives.id
    }
}

/// The durable, committed form of an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSwap {
    pub id: Uuid,
    /// In giving order: `participants[i]` gives to `participants[i + 1]`.
    pub participants: Vec<Participant>,
    pub status: MultiSwapStatus,
    pub initiator: UserId,
    pub opportunity_key: String,
    pub total_score: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every mutation.
    pub version: u64,
}

impl MultiSwap {
    pub(crate) fn from_opportunity(
        opportunity: &Opportunity,
        initiator: &UserId,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Self {
        let participants = opportunity
            .nodes
            .iter()
            .map(|node| Participant {
                node: node.clone(),
                confirmed: false,
                confirmed_at: None,
                notified_at: None,
            })
            .collect();
        Self {
            id: Uuid::new_v4(),
            participants,
            status: MultiSwapStatus::Pending,
            initiator: initiator.clone(),
            opportunity_key: opportunity.key.clone(),
            total_score: opportunity.total_score,
            created_at: now,
            expires_at: now + window,
            updated_at: now,
            version: 0,
        }
    }

    pub fn participant(&self, user: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user() == user)
    }

    pub(crate) fn participant_mut(&mut self, user: &UserId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.user() == user)
    }

    pub fn users(&self) -> Vec<UserId> {
        self.participants.iter().map(|p| p.user().clone()).collect()
    }

    pub fn items(&self) -> Vec<ItemId> {
        self.participants.iter().map(|p| p.gives().clone()).collect()
    }

    pub fn unconfirmed(&self) -> Vec<UserId> {
        self.participants
            .iter()
            .filter(|p| !p.confirmed)
            .map(|p| p.user().clone())
            .collect()
    }

    /// Participants still to confirm.
    pub fn remaining(&self) -> usize {
        self.participants.iter().filter(|p| !p.confirmed).count()
    }

    pub fn all_confirmed(&self) -> bool {
        self.remaining() == 0
    }

    /// The confirmation window has elapsed.
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Move to `next`, enforcing the one-way transition table.
    pub(crate) fn transition(
        &mut self,
        next: MultiSwapStatus,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::NotPending {
                id: self.id,
                status: self.status,
            });
        }
        self.status = next;
        self.touch(now);
        Ok(())
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MultiSwapStatus::*;

    #[test]
    fn test_transition_table() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Expired));
        assert!(Confirmed.can_transition_to(Completed));

        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Confirmed.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Pending));
        assert!(!Expired.can_transition_to(Confirmed));
        assert!(!Completed.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_active_states() {
        assert!(Pending.is_active());
        assert!(Confirmed.is_active());
        assert!(Completed.is_terminal());
        assert!(Rejected.is_terminal());
        assert!(Expired.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Pending).unwrap(), "\"pending\"");
        assert_eq!(Expired.to_string(), "expired");
    }
}
