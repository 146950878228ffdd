//! Strategies deciding whether an item satisfies a want.
//!
//! Matchers are tried in rank order and the first hit wins, so an exact
//! category match always beats a parent-category or tag match for the same
//! item/want pair.

use crate::core::category::CategoryTaxonomy;
use crate::core::item::{Item, Want};
use serde::{Deserialize, Serialize};

/// How an item satisfied a want.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Parent,
    Tag,
}

impl MatchKind {
    /// Category affinity contributed to the score.
    pub fn affinity(self) -> f64 {
        match self {
            MatchKind::Exact => 1.0,
            MatchKind::Parent => 0.6,
            MatchKind::Tag => 0.4,
        }
    }
}

/// One matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryMatcher {
    /// Item category equals the wanted category.
    ExactMatch,
    /// The wanted category is an ancestor of the item's category.
    ParentMatch,
    /// Item and want share at least one tag (case-insensitive).
    TagMatch,
}

impl CategoryMatcher {
    pub fn matches(self, item: &Item, want: &Want, taxonomy: &CategoryTaxonomy) -> Option<MatchKind> {
        match self {
            CategoryMatcher::ExactMatch => {
                (item.category == want.category).then_some(MatchKind::Exact)
            }
            CategoryMatcher::ParentMatch => taxonomy
                .is_ancestor(&want.category, &item.category)
                .then_some(MatchKind::Parent),
            CategoryMatcher::TagMatch => {
                let shared = want.tags.iter().any(|wt| {
                    item.tags.iter().any(|it| it.eq_ignore_ascii_case(wt))
                });
                shared.then_some(MatchKind::Tag)
            }
        }
    }
}

/// Ranked list of matchers.
///
/// # Examples
///
/// ```
/// use multiswap_engine::core::category::{Category, CategoryTaxonomy};
/// use multiswap_engine::core::item::{Item, Want};
/// use multiswap_engine::graph::matcher::{MatchKind, MatcherChain};
/// use rust_decimal_macros::dec;
///
/// let mut taxonomy = CategoryTaxonomy::new();
/// taxonomy.set_parent(Category::new("cameras"), Category::new("electronics"));
///
/// let camera = Item::new("cam", "a", "cameras", dec!(100), "Lyon");
/// let want = Want::new("b", "electronics");
///
/// let chain = MatcherChain::default();
/// assert_eq!(chain.best_match(&camera, &want, &taxonomy), Some(MatchKind::Parent));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherChain {
    matchers: Vec<CategoryMatcher>,
}

impl Default for MatcherChain {
    fn default() -> Self {
        Self::new(vec![
            CategoryMatcher::ExactMatch,
            CategoryMatcher::ParentMatch,
            CategoryMatcher::TagMatch,
        ])
    }
}

impl MatcherChain {
    pub fn new(matchers: Vec<CategoryMatcher>) -> Self {
        Self { matchers }
    }

    pub fn matchers(&self) -> &[CategoryMatcher] {
        &self.matchers
    }

    /// First matcher in rank order that accepts the pair.
    pub fn best_match(&self, item: &Item, want: &Want, taxonomy: &CategoryTaxonomy) -> Option<MatchKind> {
        self.matchers
            .iter()
            .find_map(|m| m.matches(item, want, taxonomy))
    }

    /// Best match of an item against any of a user's wants.
    ///
    /// Returns the satisfied want alongside the match kind; ties between wants
    /// go to the one declared first.
    pub fn best_against<'w>(
        &self,
        item: &Item,
        wants: impl IntoIterator<Item = &'w Want>,
        taxonomy: &CategoryTaxonomy,
    ) -> Option<(MatchKind, &'w Want)> {
        let mut best: Option<(MatchKind, &'w Want)> = None;
        for want in wants {
            if let Some(kind) = self.best_match(item, want, taxonomy) {
                match best {
                    Some((current, _)) if current <= kind => {}
                    _ => best = Some((kind, want)),
                }
                if kind == MatchKind::Exact {
                    break;
                }
            }
        }
        best
    }
}
