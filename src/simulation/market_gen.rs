//! Random and structured market generators for load testing, benchmarks
//! and the `generate` CLI command.

use crate::core::category::{Category, CategoryTaxonomy};
use crate::core::item::{Item, Want};
use crate::core::snapshot::MarketSnapshot;
use crate::core::user::UserProfile;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

const CITIES: &[(&str, &str)] = &[
    ("Lyon", "ARA"),
    ("Grenoble", "ARA"),
    ("Paris", "IDF"),
    ("Versailles", "IDF"),
    ("Marseille", "PACA"),
    ("Nice", "PACA"),
];

/// Leaf categories and their parent.
const CATEGORIES: &[(&str, &str)] = &[
    ("novels", "books"),
    ("comics", "books"),
    ("board-games", "games"),
    ("video-games", "games"),
    ("vinyl", "music"),
    ("guitars", "music"),
    ("drills", "tools"),
    ("bikes", "sports"),
];

/// Configuration for generating a random market.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub user_count: usize,
    pub items_per_user: usize,
    pub wants_per_user: usize,
    /// Trust scores are drawn uniformly from this range (inclusive).
    pub min_trust: u8,
    pub max_trust: u8,
    /// Item values are drawn uniformly from this range, in whole units.
    pub min_value: u32,
    pub max_value: u32,
    /// Share of wants that name a parent category instead of a leaf.
    pub parent_want_ratio: f64,
    /// Same seed, same market.
    pub seed: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            user_count: 50,
            items_per_user: 2,
            wants_per_user: 2,
            min_trust: 40,
            max_trust: 100,
            min_value: 10,
            max_value: 200,
            parent_want_ratio: 0.2,
            seed: 42,
        }
    }
}

/// The fixed category tree used by generated markets.
pub fn default_taxonomy() -> CategoryTaxonomy {
    let mut taxonomy = CategoryTaxonomy::new();
    for (leaf, parent) in CATEGORIES {
        taxonomy.set_parent(Category::new(*leaf), Category::new(*parent));
    }
    taxonomy
}

/// Generate a random market.
pub fn generate_random_market(config: &MarketConfig) -> MarketSnapshot {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut snap = MarketSnapshot::new();
    snap.set_taxonomy(default_taxonomy());

    let (lo_trust, hi_trust) = ordered(config.min_trust, config.max_trust);
    let (lo_value, hi_value) = ordered(config.min_value, config.max_value);

    for u in 0..config.user_count {
        let user_id = format!("user-{:04}", u);
        let (city, region) = CITIES[rng.gen_range(0..CITIES.len())];
        let trust = rng.gen_range(lo_trust..=hi_trust);
        snap.add_user(UserProfile::new(user_id.as_str(), trust, city, region));

        for i in 0..config.items_per_user {
            let (leaf, _) = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
            let value = Decimal::from(rng.gen_range(lo_value..=hi_value));
            snap.add_item(
                Item::new(format!("{}-item-{}", user_id, i), user_id.as_str(), leaf, value, city)
                    .with_title(format!("{} #{}", leaf, i)),
            );
        }

        let mut picks: Vec<&(&str, &str)> = CATEGORIES.iter().collect();
        picks.shuffle(&mut rng);
        for (leaf, parent) in picks.into_iter().take(config.wants_per_user) {
            let category = if rng.gen_bool(config.parent_want_ratio.clamp(0.0, 1.0)) {
                *parent
            } else {
                *leaf
            };
            snap.add_want(Want::new(user_id.as_str(), category));
        }
    }

    log::debug!(
        "generated market: {} users, {} items, {} wants (seed {})",
        snap.users().len(),
        snap.items().len(),
        snap.wants().len(),
        config.seed
    );
    snap
}

/// A market of `n` users forming exactly one cycle: user `i` offers an item
/// in category `cat-i`, and user `i + 1` wants it.
pub fn ring_market(n: usize, value: Decimal) -> MarketSnapshot {
    let mut snap = MarketSnapshot::new();
    for i in 0..n {
        let user = format!("ring-{:03}", i);
        snap.add_user(UserProfile::new(user.as_str(), 100, "Lyon", "ARA"));
        snap.add_item(Item::new(
            format!("ring-item-{:03}", i),
            user.as_str(),
            format!("cat-{}", i).as_str(),
            value,
            "Lyon",
        ));
        let wanted = (i + n - 1) % n.max(1);
        snap.add_want(Want::new(user.as_str(), format!("cat-{}", wanted).as_str()));
    }
    snap
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::graph::cycle_finder::CycleFinder;
    use crate::graph::want_graph::{OpportunityFilters, WantGraph};
    use std::collections::HashSet;

    #[test]
    fn test_random_market_generation() {
        let config = MarketConfig {
            user_count: 20,
            items_per_user: 3,
            ..Default::default()
        };
        let snap = generate_random_market(&config);
        assert_eq!(snap.users().len(), 20);
        assert_eq!(snap.items().len(), 60);
        assert_eq!(snap.wants().len(), 40);
        for item in snap.items() {
            assert!(item.value >= Decimal::from(config.min_value));
            assert!(item.value <= Decimal::from(config.max_value));
        }
    }

    #[test]
    fn test_same_seed_same_market() {
        let config = MarketConfig::default();
        let a = serde_json::to_string(&generate_random_market(&config)).unwrap();
        let b = serde_json::to_string(&generate_random_market(&config)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ring_has_one_cycle() {
        let snap = ring_market(4, Decimal::from(50));
        let config = EngineConfig::default();
        let filters = OpportunityFilters::default();
        let graph = WantGraph::build(&snap, &"ring-002".into(), &filters, &config, &HashSet::new());
        let found = CycleFinder::from_config(&config, &filters).find(&graph);
        assert_eq!(found.cycles.len(), 1);
        assert_eq!(found.cycles[0].len(), 4);
    }
}
