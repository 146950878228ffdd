use crate::core::item::ItemId;
use crate::core::user::UserId;
use crate::multiswap::state::MultiSwapStatus;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Coarse classification callers branch on.
///
/// Conflicts are worth retrying with a fresh opportunity; validation errors
/// are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
}

/// Errors surfaced by the swap engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("a swap cycle needs at least {min} participants, got {count}")]
    TooFewParticipants { count: usize, min: usize },

    #[error("user {0} appears more than once in the cycle")]
    DuplicateParticipant(UserId),

    #[error("item {0} appears more than once in the cycle")]
    DuplicateItem(ItemId),

    #[error("unknown user {0}")]
    UnknownUser(UserId),

    #[error("unknown item {0}")]
    UnknownItem(ItemId),

    #[error("item {item} does not belong to user {user}")]
    ItemNotOwned { item: ItemId, user: UserId },

    #[error("user {0} is suspended and cannot take part in swaps")]
    UserSuspended(UserId),

    #[error("item {0} is no longer listed")]
    ItemUnavailable(ItemId),

    #[error("{giver}'s item no longer matches anything {receiver} wants")]
    BrokenLink { giver: UserId, receiver: UserId },

    #[error("initiator {0} is not a participant of the cycle")]
    InitiatorNotParticipant(UserId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown rejection reason '{0}'")]
    UnknownRejectionReason(String),

    #[error("item {item} was just claimed by another swap ({swap_id})")]
    ItemReserved { item: ItemId, swap_id: Uuid },

    #[error("swap {id} is {status}, not pending")]
    NotPending { id: Uuid, status: MultiSwapStatus },

    #[error("swap {id} expired at {expired_at}")]
    Expired { id: Uuid, expired_at: DateTime<Utc> },

    #[error("swap {0} not found")]
    SwapNotFound(Uuid),

    #[error("user {user} is not a participant of swap {id}")]
    NotParticipant { id: Uuid, user: UserId },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::ItemReserved { .. }
            | EngineError::NotPending { .. }
            | EngineError::Expired { .. } => ErrorKind::Conflict,
            EngineError::SwapNotFound(_) | EngineError::NotParticipant { .. } => {
                ErrorKind::NotFound
            }
            _ => ErrorKind::Validation,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
