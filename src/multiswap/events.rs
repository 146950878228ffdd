//! Events produced by the state machine and notifications sent to users.

use crate::core::error::EngineError;
use crate::core::item::ItemId;
use crate::core::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Why a participant declined a swap.
///
/// Serialized as a short code: `"changed_mind"`, `"item_unavailable"`,
/// `"value_mismatch"`, `"too_far"` or `"other:<free text>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RejectionReason {
    ChangedMind,
    ItemUnavailable,
    ValueMismatch,
    TooFar,
    Other(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::ChangedMind => write!(f, "changed_mind"),
            RejectionReason::ItemUnavailable => write!(f, "item_unavailable"),
            RejectionReason::ValueMismatch => write!(f, "value_mismatch"),
            RejectionReason::TooFar => write!(f, "too_far"),
            RejectionReason::Other(text) => write!(f, "other:{}", text),
        }
    }
}

impl FromStr for RejectionReason {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "changed_mind" => Ok(RejectionReason::ChangedMind),
            "item_unavailable" => Ok(RejectionReason::ItemUnavailable),
            "value_mismatch" => Ok(RejectionReason::ValueMismatch),
            "too_far" => Ok(RejectionReason::TooFar),
            other => match other.strip_prefix("other:") {
                Some(text) if !text.trim().is_empty() => {
                    Ok(RejectionReason::Other(text.trim().to_string()))
                }
                _ => Err(EngineError::UnknownRejectionReason(s.to_string())),
            },
        }
    }
}

impl TryFrom<String> for RejectionReason {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RejectionReason> for String {
    fn from(reason: RejectionReason) -> Self {
        reason.to_string()
    }
}

/// One participant orphaned by another participant's rejection.
///
/// A rejection produces one event per other participant so each can be
/// routed into the rescue search on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionEvent {
    pub swap_id: Uuid,
    pub rejected_by: UserId,
    pub reason: Option<RejectionReason>,
    /// The participant this event is addressed to.
    pub affected: UserId,
    /// Every participant other than the rejecter.
    pub orphaned: Vec<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// A swap the expiry sweep closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiredSwap {
    pub swap_id: Uuid,
    pub opportunity_key: String,
    pub participants: Vec<UserId>,
    /// Participants that never confirmed.
    pub unconfirmed: Vec<UserId>,
    pub released_items: Vec<ItemId>,
    pub expired_at: DateTime<Utc>,
}

/// Fire-and-forget message for the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwapNotification {
    Invited {
        swap_id: Uuid,
        initiator: UserId,
        expires_at: DateTime<Utc>,
    },
    ParticipantConfirmed {
        swap_id: Uuid,
        user: UserId,
        remaining: usize,
    },
    AllConfirmed {
        swap_id: Uuid,
    },
    Rejected {
        swap_id: Uuid,
        by: UserId,
        reason: Option<RejectionReason>,
    },
    Expired {
        swap_id: Uuid,
    },
    AlternativesFound {
        swap_id: Uuid,
        count: usize,
    },
    Completed {
        swap_id: Uuid,
    },
}

impl SwapNotification {
    pub fn swap_id(&self) -> Uuid {
        match self {
            SwapNotification::Invited { swap_id, .. }
            | SwapNotification::ParticipantConfirmed { swap_id, .. }
            | SwapNotification::AllConfirmed { swap_id }
            | SwapNotification::Rejected { swap_id, .. }
            | SwapNotification::Expired { swap_id }
            | SwapNotification::AlternativesFound { swap_id, .. }
            | SwapNotification::Completed { swap_id } => *swap_id,
        }
    }
}
