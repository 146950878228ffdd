use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A listing category, e.g. `"electronics"` or `"electronics/cameras"`.
///
/// Categories are compared case-sensitively; the taxonomy decides how they
/// nest.
///
/// # Examples
///
/// ```
/// use multiswap_engine::core::category::Category;
///
/// let books = Category::new("books");
/// assert_eq!(books.as_str(), "books");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One `child -> parent` link as it appears in a market snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryLink {
    pub name: Category,
    pub parent: Category,
}

/// Parent relationships between categories.
///
/// Used by the parent-category matcher: a want for `"electronics"` is
/// satisfied (with reduced affinity) by an item listed under
/// `"electronics/cameras"`.
///
/// # Examples
///
/// ```
/// use multiswap_engine::core::category::{Category, CategoryTaxonomy};
///
/// let mut taxonomy = CategoryTaxonomy::new();
/// taxonomy.set_parent(Category::new("cameras"), Category::new("electronics"));
///
/// assert!(taxonomy.is_ancestor(&Category::new("electronics"), &Category::new("cameras")));
/// assert!(!taxonomy.is_ancestor(&Category::new("cameras"), &Category::new("electronics")));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CategoryLink>", into = "Vec<CategoryLink>")]
pub struct CategoryTaxonomy {
    parents: HashMap<Category, Category>,
}

impl CategoryTaxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `parent` as the direct parent of `child`.
    ///
    /// A link that would close a loop in the hierarchy is ignored.
    pub fn set_parent(&mut self, child: Category, parent: Category) {
        if child == parent || self.is_ancestor(&child, &parent) {
            log::warn!("ignoring category link {} -> {}: would form a loop", child, parent);
            return;
        }
        self.parents.insert(child, parent);
    }

    /// Direct parent of a category, if any.
    pub fn parent(&self, category: &Category) -> Option<&Category> {
        self.parents.get(category)
    }

    /// True when `ancestor` sits strictly above `category` in the hierarchy.
    pub fn is_ancestor(&self, ancestor: &Category, category: &Category) -> bool {
        let mut current = self.parents.get(category);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parents.get(parent);
        }
        false
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl From<Vec<CategoryLink>> for CategoryTaxonomy {
    fn from(links: Vec<CategoryLink>) -> Self {
        let mut taxonomy = Self::new();
        for link in links {
            taxonomy.set_parent(link.name, link.parent);
        }
        taxonomy
    }
}

impl From<CategoryTaxonomy> for Vec<CategoryLink> {
    fn from(taxonomy: CategoryTaxonomy) -> Self {
        let mut links: Vec<CategoryLink> = taxonomy
            .parents
            .into_iter()
            .map(|(name, parent)| CategoryLink { name, parent })
            .collect();
        links.sort_by(|a, b| a.name.cmp(&b.name));
        links
    }
}
