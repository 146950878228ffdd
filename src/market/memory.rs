use crate::core::error::EngineError;
use crate::core::item::{Item, ItemId, Want};
use crate::core::snapshot::MarketSnapshot;
use crate::core::user::UserProfile;
use crate::market::Marketplace;
use parking_lot::RwLock;

/// A marketplace held entirely in memory.
///
/// Backs the CLI and the tests. Writers take the lock briefly; `snapshot`
/// clones under a read guard so a search never observes a half-applied
/// update.
#[derive(Debug, Default)]
pub struct InMemoryMarketplace {
    inner: RwLock<MarketSnapshot>,
}

impl InMemoryMarketplace {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    pub fn upsert_user(&self, user: UserProfile) {
        self.inner.write().add_user(user);
    }

    pub fn upsert_item(&self, item: Item) {
        self.inner.write().add_item(item);
    }

    pub fn add_want(&self, want: Want) {
        self.inner.write().add_want(want);
    }

    /// Delist an item, e.g. because it was sold elsewhere.
    pub fn deactivate_item(&self, item: &ItemId) -> Result<(), EngineError> {
        let mut snap = self.inner.write();
        let it = snap
            .item_mut(item)
            .ok_or_else(|| EngineError::UnknownItem(item.clone()))?;
        it.active = false;
        Ok(())
    }

    pub fn is_reserved(&self, item: &ItemId) -> bool {
        self.inner.read().item(item).map_or(false, |it| it.reserved)
    }
}

impl Marketplace for InMemoryMarketplace {
    fn snapshot(&self) -> MarketSnapshot {
        self.inner.read().clone()
    }

    fn set_item_reserved(&self, item: &ItemId, reserved: bool) -> Result<(), EngineError> {
        let mut snap = self.inner.write();
        let it = snap
            .item_mut(item)
            .ok_or_else(|| EngineError::UnknownItem(item.clone()))?;
        it.reserved = reserved;
        Ok(())
    }

    fn retire_item(&self, item: &ItemId) -> Result<(), EngineError> {
        let mut snap = self.inner.write();
        let it = snap
            .item_mut(item)
            .ok_or_else(|| EngineError::UnknownItem(item.clone()))?;
        it.active = false;
        it.reserved = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market() -> InMemoryMarketplace {
        let mut snap = MarketSnapshot::new();
        snap.add_user(UserProfile::new("a", 80, "Lyon", "ARA"));
        snap.add_item(Item::new("x", "a", "books", dec!(12), "Lyon"));
        InMemoryMarketplace::new(snap)
    }

    #[test]
    fn test_reserved_flag_roundtrip() {
        let m = market();
        let x = ItemId::new("x");
        m.set_item_reserved(&x, true).unwrap();
        assert!(m.is_reserved(&x));
        assert!(!m.snapshot().item(&x).unwrap().is_available());
        m.set_item_reserved(&x, false).unwrap();
        assert!(!m.is_reserved(&x));
    }

    #[test]
    fn test_unknown_item() {
        let err = market().set_item_reserved(&"nope".into(), true).unwrap_err();
        assert_eq!(err, EngineError::UnknownItem("nope".into()));
    }

    #[test]
    fn test_retired_item_is_unavailable() {
        let m = market();
        let x = ItemId::new("x");
        m.set_item_reserved(&x, true).unwrap();
        m.retire_item(&x).unwrap();
        let snap = m.snapshot();
        let it = snap.item(&x).unwrap();
        assert!(!it.active);
        assert!(!it.reserved);
        assert!(!it.is_available());
        assert!(m.retire_item(&"nope".into()).is_err());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let m = market();
        let before = m.snapshot();
        m.deactivate_item(&"x".into()).unwrap();
        assert!(before.item(&"x".into()).unwrap().active);
        assert!(!m.snapshot().item(&"x".into()).unwrap().active);
    }
}
