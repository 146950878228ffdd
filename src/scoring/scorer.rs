use crate::core::category::Category;
use crate::core::config::{EngineConfig, ScoreWeights, TierThresholds};
use crate::core::item::ItemId;
use crate::core::snapshot::MarketSnapshot;
use crate::core::user::{UserId, UserProfile};
use crate::graph::cycle_finder::RawCycle;
use crate::graph::matcher::MatchKind;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The slice of an item listing carried inside an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub title: String,
    pub category: Category,
    pub value: Decimal,
    pub city: String,
}

/// One participant's slot in a cycle: what they give, what they receive and
/// which of their wants it satisfies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapNode {
    pub user: UserId,
    pub gives: ItemSummary,
    /// Item handed to this user by the previous participant.
    pub receives: ItemId,
    /// The want the received item satisfies.
    pub wants: Category,
    pub match_kind: MatchKind,
    /// Trust score at discovery time.
    pub trust_score: u8,
    pub city: String,
    pub region: String,
}

/// Coarse bucket for UI grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityTier {
    pub fn from_score(score: f64, thresholds: &TierThresholds) -> Self {
        if score >= thresholds.excellent {
            QualityTier::Excellent
        } else if score >= thresholds.good {
            QualityTier::Good
        } else if score >= thresholds.fair {
            QualityTier::Fair
        } else {
            QualityTier::Poor
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityTier::Excellent => "excellent",
            QualityTier::Good => "good",
            QualityTier::Fair => "fair",
            QualityTier::Poor => "poor",
        };
        write!(f, "{}", s)
    }
}

/// A scored, uncommitted candidate cycle.
///
/// `nodes[i]` gives to `nodes[i + 1]`, and the last node gives to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Stable key built from the `(user, item)` sequence.
    pub key: String,
    pub nodes: Vec<SwapNode>,
    pub total_score: f64,
    pub is_value_balanced: bool,
    /// Largest relative give/receive gap of any participant.
    pub max_value_deviation: Decimal,
    pub value_balance_score: f64,
    pub trust_score: f64,
    pub location_score: f64,
    pub category_score: f64,
    pub tier: QualityTier,
    pub discovered_at: DateTime<Utc>,
}

impl Opportunity {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn participants(&self) -> Vec<&UserId> {
        self.nodes.iter().map(|n| &n.user).collect()
    }

    pub fn contains_user(&self, user: &UserId) -> bool {
        self.nodes.iter().any(|n| &n.user == user)
    }

    /// Each node receives exactly what the previous node gives.
    pub fn is_closed(&self) -> bool {
        let n = self.nodes.len();
        n > 0 && (0..n).all(|i| self.nodes[(i + 1) % n].receives == self.nodes[i].gives.id)
    }
}

/// Key identifying a cycle by its `(user, item)` giving sequence.
pub fn cycle_key<'a>(slots: impl IntoIterator<Item = (&'a UserId, &'a ItemId)>) -> String {
    slots
        .into_iter()
        .map(|(u, i)| format!("{}:{}", u, i))
        .collect::<Vec<_>>()
        .join(">")
}

/// Relative gap between two values: `|a - b| / max(a, b)`, zero when both are zero.
pub fn value_deviation(a: Decimal, b: Decimal) -> Decimal {
    let max = a.max(b);
    if max <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (a - b).abs() / max
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Multi-factor cycle scorer.
///
/// Sub-scores are each in `[0, 1]`:
///
/// - **value balance**: `1 - max deviation` between what each participant
///   gives and receives;
/// - **trust**: the minimum participant trust, so one weak link is never
///   averaged away;
/// - **location**: per hand-over, 1 for the same city, 0.5 for the same
///   region, 0 otherwise, averaged;
/// - **category**: average match affinity (exact > parent > tag).
///
/// The total is the weight-normalised sum of the four.
#[derive(Debug, Clone)]
pub struct CycleScorer {
    pub weights: ScoreWeights,
    pub tiers: TierThresholds,
    pub value_tolerance: Decimal,
}

impl CycleScorer {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            tiers: config.tiers.clone(),
            value_tolerance: config.value_tolerance,
        }
    }

    /// Score every cycle and sort best first.
    ///
    /// Ties are broken by cycle key so output order is reproducible.
    pub fn score_all(
        &self,
        snapshot: &MarketSnapshot,
        cycles: &[RawCycle],
        now: DateTime<Utc>,
    ) -> Vec<Opportunity> {
        let mut scored: Vec<Opportunity> = cycles
            .iter()
            .filter_map(|c| self.score(snapshot, c, now))
            .collect();
        scored.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        scored
    }

    /// Materialise and score a single cycle.
    ///
    /// Returns `None` if the snapshot no longer knows one of the users or
    /// items.
    pub fn score(
        &self,
        snapshot: &MarketSnapshot,
        cycle: &RawCycle,
        now: DateTime<Utc>,
    ) -> Option<Opportunity> {
        let n = cycle.len();
        if n == 0 {
            return None;
        }

        let mut profiles: Vec<&UserProfile> = Vec::with_capacity(n);
        let mut nodes: Vec<SwapNode> = Vec::with_capacity(n);
        for i in 0..n {
            let edge = &cycle.edges[i];
            let incoming = &cycle.edges[(i + n - 1) % n];
            let (profile, item) = match (snapshot.user(&edge.giver), snapshot.item(&edge.item)) {
                (Some(p), Some(it)) => (p, it),
                _ => {
                    log::warn!("dropping cycle: {} or {} missing from snapshot", edge.giver, edge.item);
                    return None;
                }
            };
            profiles.push(profile);
            nodes.push(SwapNode {
                user: edge.giver.clone(),
                gives: ItemSummary {
                    id: item.id.clone(),
                    title: item.title.clone(),
                    category: item.category.clone(),
                    value: item.value,
                    city: item.city.clone(),
                },
                receives: incoming.item.clone(),
                wants: incoming.wanted.clone(),
                match_kind: incoming.kind,
                trust_score: profile.trust_score,
                city: profile.city.clone(),
                region: profile.region.clone(),
            });
        }

        let max_value_deviation = (0..n)
            .map(|i| value_deviation(nodes[i].gives.value, nodes[(i + n - 1) % n].gives.value))
            .max()
            .unwrap_or(Decimal::ZERO);
        let is_value_balanced = max_value_deviation <= self.value_tolerance;
        let value_balance_score = (1.0 - to_f64(max_value_deviation)).clamp(0.0, 1.0);

        let trust_score = profiles
            .iter()
            .map(|p| p.normalized_trust())
            .fold(1.0_f64, f64::min);

        let location_score = (0..n)
            .map(|i| proximity(profiles[i], profiles[(i + 1) % n]))
            .sum::<f64>()
            / n as f64;

        let category_score = cycle.edges.iter().map(|e| e.kind.affinity()).sum::<f64>() / n as f64;

        let w = &self.weights;
        let total_score = (w.trust * trust_score
            + w.value_balance * value_balance_score
            + w.location * location_score
            + w.category * category_score)
            / w.sum();

        let key = cycle_key(nodes.iter().map(|node| (&node.user, &node.gives.id)));

        Some(Opportunity {
            key,
            nodes,
            total_score,
            is_value_balanced,
            max_value_deviation,
            value_balance_score,
            trust_score,
            location_score,
            category_score,
            tier: QualityTier::from_score(total_score, &self.tiers),
            discovered_at: now,
        })
    }
}

/// Hand-over proximity between two participants.
fn proximity(giver: &UserProfile, receiver: &UserProfile) -> f64 {
    if giver.city.eq_ignore_ascii_case(&receiver.city) {
        1.0
    } else if giver.region.eq_ignore_ascii_case(&receiver.region) {
        0.5
    } else {
        0.0
    }
}
