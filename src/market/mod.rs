//! Seams to the rest of the marketplace: the listing/user/want stores the
//! engine reads from, and the notification dispatcher it writes to.

pub mod memory;
pub mod notify;

use crate::core::error::EngineError;
use crate::core::item::ItemId;
use crate::core::snapshot::MarketSnapshot;
use crate::core::user::UserId;
use crate::multiswap::events::SwapNotification;

/// Read access to users, listings and wants, plus the writes the engine
/// performs on listings: the reserved flag and retiring traded items.
pub trait Marketplace: Send + Sync {
    /// A consistent view of the market at call time.
    fn snapshot(&self) -> MarketSnapshot;

    fn set_item_reserved(&self, item: &ItemId, reserved: bool) -> Result<(), EngineError>;

    /// Take an item that changed hands out of circulation.
    fn retire_item(&self, item: &ItemId) -> Result<(), EngineError>;
}

/// Fire-and-forget notification dispatcher. Delivery failures are the
/// dispatcher's problem; the engine never waits on them.
pub trait Notifier: Send + Sync {
    fn notify(&self, user: &UserId, notification: &SwapNotification);
}

pub use memory::InMemoryMarketplace;
pub use notify::{LogNotifier, RecordingNotifier};
