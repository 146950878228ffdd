//! Tunable knobs for search, scoring and the confirmation window.
//!
//! Every field has a default; a JSON config file only needs to name the
//! values it overrides.

use crate::core::error::EngineError;
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Smallest cycle the engine will ever propose or accept.
pub const MIN_CYCLE_LENGTH: usize = 3;

/// Relative weight of each scoring factor in the total score.
///
/// Weights are normalised by their sum, so they need not add up to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub trust: f64,
    pub value_balance: f64,
    pub location: f64,
    pub category: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            trust: 0.30,
            value_balance: 0.25,
            location: 0.25,
            category: 0.20,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.trust + self.value_balance + self.location + self.category
    }
}

/// Lower bounds of the quality tiers, applied to the total score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            excellent: 0.85,
            good: 0.70,
            fair: 0.50,
        }
    }
}

/// Engine configuration.
///
/// # Examples
///
/// ```
/// use multiswap_engine::core::config::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "max_cycle_length": 4 }"#).unwrap();
/// assert_eq!(config.max_cycle_length, 4);
/// assert_eq!(config.confirmation_window_hours, 48);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Longest cycle the finder explores (inclusive).
    pub max_cycle_length: usize,
    /// How long participants have to confirm a new MultiSwap.
    pub confirmation_window_hours: i64,
    /// Users below this trust score are left out of the graph.
    pub min_trust_score: u8,
    /// Paths whose product of normalised trust drops below this are abandoned.
    pub path_trust_floor: f64,
    /// Maximum relative give/receive deviation for a value-balanced cycle.
    pub value_tolerance: Decimal,
    /// Balanced-only search: every item must be within this ratio of the
    /// requester's item value.
    pub balanced_edge_ratio: Decimal,
    pub weights: ScoreWeights,
    pub tiers: TierThresholds,
    /// Opportunities returned per request.
    pub max_opportunities: usize,
    /// Alternatives proposed per orphaned participant.
    pub max_alternatives: usize,
    /// Raw cycles collected before the search stops.
    pub max_raw_cycles: usize,
    /// Edge expansions allowed per search.
    pub max_search_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cycle_length: 5,
            confirmation_window_hours: 48,
            min_trust_score: 0,
            path_trust_floor: 0.25,
            value_tolerance: dec!(0.20),
            balanced_edge_ratio: dec!(0.30),
            weights: ScoreWeights::default(),
            tiers: TierThresholds::default(),
            max_opportunities: 20,
            max_alternatives: 3,
            max_raw_cycles: 200,
            max_search_steps: 50_000,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfig(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn confirmation_window(&self) -> Duration {
        Duration::hours(self.confirmation_window_hours)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_cycle_length < MIN_CYCLE_LENGTH {
            return Err(EngineError::InvalidConfig(format!(
                "max_cycle_length must be at least {}, got {}",
                MIN_CYCLE_LENGTH, self.max_cycle_length
            )));
        }
        if self.confirmation_window_hours <= 0 {
            return Err(EngineError::InvalidConfig(format!(
                "confirmation_window_hours must be positive, got {}",
                self.confirmation_window_hours
            )));
        }
        if !(0.0..=1.0).contains(&self.path_trust_floor) {
            return Err(EngineError::InvalidConfig(format!(
                "path_trust_floor must be within [0, 1], got {}",
                self.path_trust_floor
            )));
        }
        if self.value_tolerance < Decimal::ZERO || self.balanced_edge_ratio < Decimal::ZERO {
            return Err(EngineError::InvalidConfig(
                "value tolerances must not be negative".to_string(),
            ));
        }
        let w = &self.weights;
        if [w.trust, w.value_balance, w.location, w.category]
            .iter()
            .any(|x| !x.is_finite() || *x < 0.0)
        {
            return Err(EngineError::InvalidConfig(
                "score weights must be finite and non-negative".to_string(),
            ));
        }
        if w.sum() <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "score weights must not all be zero".to_string(),
            ));
        }
        let t = &self.tiers;
        if !(t.excellent >= t.good && t.good >= t.fair && t.fair >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "tier thresholds must satisfy excellent >= good >= fair >= 0, got {} / {} / {}",
                t.excellent, t.good, t.fair
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.confirmation_window(), Duration::hours(48));
    }

    #[test]
    fn test_trust_weighted_heaviest() {
        let w = ScoreWeights::default();
        assert!(w.trust > w.value_balance);
        assert!(w.trust > w.location);
        assert!(w.trust > w.category);
        assert!((w.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_override() {
        let config =
            EngineConfig::from_json_str(r#"{ "value_tolerance": "0.1", "weights": { "trust": 0.5 } }"#)
                .unwrap();
        assert_eq!(config.value_tolerance, dec!(0.1));
        assert_eq!(config.weights.trust, 0.5);
        assert_eq!(config.weights.category, 0.20);
        assert_eq!(config.max_alternatives, 3);
    }

    #[test]
    fn test_rejects_short_cycles() {
        let err = EngineConfig::from_json_str(r#"{ "max_cycle_length": 2 }"#).unwrap_err();
        assert!(err.to_string().contains("max_cycle_length"));
    }

    #[test]
    fn test_rejects_unordered_tiers() {
        let config = EngineConfig {
            tiers: TierThresholds {
                excellent: 0.5,
                good: 0.7,
                fair: 0.2,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(EngineConfig::from_json_str("{ not json").is_err());
    }
}
