use crate::core::category::CategoryTaxonomy;
use crate::core::item::{Item, ItemId, Want};
use crate::core::user::{UserId, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Point-in-time copy of everything the engine reads from its collaborators:
/// user directory, item store, wish lists and the category taxonomy.
///
/// Search runs entirely against a snapshot so it has no side effects and can
/// be retried or dropped at any point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "SnapshotFile", into = "SnapshotFile")]
pub struct MarketSnapshot {
    users: Vec<UserProfile>,
    items: Vec<Item>,
    wants: Vec<Want>,
    taxonomy: CategoryTaxonomy,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
}

/// On-disk layout of a snapshot; indexes are rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    users: Vec<UserProfile>,
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    wants: Vec<Want>,
    #[serde(default)]
    taxonomy: CategoryTaxonomy,
}

impl From<SnapshotFile> for MarketSnapshot {
    fn from(file: SnapshotFile) -> Self {
        let mut snapshot = Self {
            users: file.users,
            items: file.items,
            wants: file.wants,
            taxonomy: file.taxonomy,
            user_index: HashMap::new(),
            item_index: HashMap::new(),
        };
        snapshot.reindex();
        snapshot
    }
}

impl From<MarketSnapshot> for SnapshotFile {
    fn from(snapshot: MarketSnapshot) -> Self {
        Self {
            users: snapshot.users,
            items: snapshot.items,
            wants: snapshot.wants,
            taxonomy: snapshot.taxonomy,
        }
    }
}

impl MarketSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn reindex(&mut self) {
        self.user_index = self
            .users
            .iter()
            .enumerate()
            .map(|(i, u)| (u.id.clone(), i))
            .collect();
        self.item_index = self
            .items
            .iter()
            .enumerate()
            .map(|(i, it)| (it.id.clone(), i))
            .collect();
    }

    /// Add or replace a user profile.
    pub fn add_user(&mut self, user: UserProfile) {
        match self.user_index.get(&user.id) {
            Some(&idx) => self.users[idx] = user,
            None => {
                self.user_index.insert(user.id.clone(), self.users.len());
                self.users.push(user);
            }
        }
    }

    /// Add or replace an item listing.
    pub fn add_item(&mut self, item: Item) {
        match self.item_index.get(&item.id) {
            Some(&idx) => self.items[idx] = item,
            None => {
                self.item_index.insert(item.id.clone(), self.items.len());
                self.items.push(item);
            }
        }
    }

    pub fn add_want(&mut self, want: Want) {
        self.wants.push(want);
    }

    pub fn set_taxonomy(&mut self, taxonomy: CategoryTaxonomy) {
        self.taxonomy = taxonomy;
    }

    pub fn user(&self, id: &UserId) -> Option<&UserProfile> {
        self.user_index.get(id).map(|&i| &self.users[i])
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.item_index.get(id).map(|&i| &self.items[i])
    }

    pub(crate) fn item_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        match self.item_index.get(id) {
            Some(&i) => self.items.get_mut(i),
            None => None,
        }
    }

    pub fn users(&self) -> &[UserProfile] {
        &self.users
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn wants(&self) -> &[Want] {
        &self.wants
    }

    pub fn taxonomy(&self) -> &CategoryTaxonomy {
        &self.taxonomy
    }

    /// Items listed by a user, in listing order.
    pub fn items_of<'a>(&'a self, owner: &'a UserId) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.iter().filter(move |it| &it.owner == owner)
    }

    /// Declared wants of a user, in declaration order.
    pub fn wants_of<'a>(&'a self, user: &'a UserId) -> impl Iterator<Item = &'a Want> + 'a {
        self.wants.iter().filter(move |w| &w.user == user)
    }
}
