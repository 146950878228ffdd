//! # multiswap-engine
//!
//! Multi-party barter matching for a swap marketplace.
//!
//! Users list items they are willing to give and declare what they want.
//! When no two users want each other's items directly, a loop of three or
//! more users often does: A gives to B, B gives to C, C gives back to A.
//! This engine finds such loops, scores them, and runs the all-or-nothing
//! confirmation protocol that turns one into a committed swap.
//!
//! ## Architecture
//!
//! - **core** — Users, items, wants, categories, configuration, errors
//! - **graph** — Want/offer graph, matching strategies, SCC pre-pass, cycle search
//! - **scoring** — Multi-factor cycle scoring and quality tiers
//! - **multiswap** — Swap state machine, item reservations, events
//! - **rescue** — Alternative search for participants of a failed swap
//! - **market** — Marketplace and notification seams, in-memory implementations
//! - **engine** — The facade tying it together
//! - **simulation** — Random market generation

pub mod core;
pub mod engine;
pub mod graph;
pub mod market;
pub mod multiswap;
pub mod rescue;
pub mod scoring;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::config::EngineConfig;
    pub use crate::core::error::{EngineError, ErrorKind};
    pub use crate::core::item::{Item, ItemId, Want};
    pub use crate::core::snapshot::MarketSnapshot;
    pub use crate::core::user::{UserId, UserProfile};
    pub use crate::engine::{EngineStats, OpportunityReport, RejectResponse, SwapEngine};
    pub use crate::graph::want_graph::{OpportunityFilters, WantGraph};
    pub use crate::market::{InMemoryMarketplace, LogNotifier, Marketplace, Notifier};
    pub use crate::multiswap::events::{RejectionReason, SwapNotification};
    pub use crate::multiswap::state::{MultiSwap, MultiSwapStatus};
    pub use crate::scoring::scorer::{Opportunity, QualityTier};
}
