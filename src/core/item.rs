use crate::core::category::Category;
use crate::core::user::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a physical item listed on the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A listing a user is willing to give away in a swap.
///
/// # Examples
///
/// ```
/// use multiswap_engine::core::item::Item;
/// use rust_decimal_macros::dec;
///
/// let camera = Item::new("cam-1", "alice", "cameras", dec!(250), "Lyon")
///     .with_title("Fuji X100")
///     .with_tags(["vintage", "photo"]);
///
/// assert_eq!(camera.owner.as_str(), "alice");
/// assert!(camera.is_available());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub owner: UserId,
    #[serde(default)]
    pub title: String,
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Estimated value in the marketplace's reference unit.
    pub value: Decimal,
    pub city: String,
    /// Inactive listings (withdrawn, sold, exchanged) never enter the graph.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Mirror of the engine's reservation lock, written back to the item store.
    #[serde(default)]
    pub reserved: bool,
}

fn default_active() -> bool {
    true
}

impl Item {
    /// Create an active, unreserved item.
    ///
    /// # Panics
    ///
    /// Panics if `value` is negative.
    pub fn new(
        id: impl Into<ItemId>,
        owner: impl Into<UserId>,
        category: impl Into<Category>,
        value: Decimal,
        city: impl Into<String>,
    ) -> Self {
        assert!(
            value >= Decimal::ZERO,
            "Item value must not be negative, got {}",
            value
        );
        Self {
            id: id.into(),
            owner: owner.into(),
            title: String::new(),
            category: category.into(),
            tags: Vec::new(),
            value,
            city: city.into(),
            active: true,
            reserved: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Listed and not locked by a pending swap.
    pub fn is_available(&self) -> bool {
        self.active && !self.reserved
    }
}

/// A declared want from a user's wish list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Want {
    pub user: UserId,
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Want {
    pub fn new(user: impl Into<UserId>, category: impl Into<Category>) -> Self {
        Self {
            user: user.into(),
            category: category.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}
