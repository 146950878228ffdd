use crate::scoring::scorer::{Opportunity, QualityTier};
use serde::{Deserialize, Serialize};

/// Aggregate view over a set of opportunities, returned next to them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityStats {
    pub total: usize,
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    pub poor: usize,
    pub value_balanced: usize,
    pub average_total_score: f64,
    pub average_trust_score: f64,
    pub average_value_balance_score: f64,
    pub average_cycle_length: f64,
}

impl OpportunityStats {
    pub fn from_opportunities(opportunities: &[Opportunity]) -> Self {
        let mut stats = Self {
            total: opportunities.len(),
            ..Default::default()
        };
        if opportunities.is_empty() {
            return stats;
        }

        let mut total = 0.0;
        let mut trust = 0.0;
        let mut balance = 0.0;
        let mut length = 0usize;
        for opp in opportunities {
            match opp.tier {
                QualityTier::Excellent => stats.excellent += 1,
                QualityTier::Good => stats.good += 1,
                QualityTier::Fair => stats.fair += 1,
                QualityTier::Poor => stats.poor += 1,
            }
            if opp.is_value_balanced {
                stats.value_balanced += 1;
            }
            total += opp.total_score;
            trust += opp.trust_score;
            balance += opp.value_balance_score;
            length += opp.len();
        }

        let n = opportunities.len() as f64;
        stats.average_total_score = total / n;
        stats.average_trust_score = trust / n;
        stats.average_value_balance_score = balance / n;
        stats.average_cycle_length = length as f64 / n;
        stats
    }

    pub fn count(&self, tier: QualityTier) -> usize {
        match tier {
            QualityTier::Excellent => self.excellent,
            QualityTier::Good => self.good,
            QualityTier::Fair => self.fair,
            QualityTier::Poor => self.poor,
        }
    }
}

impl std::fmt::Display for OpportunityStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Opportunity Summary ===")?;
        writeln!(f, "Opportunities:   {}", self.total)?;
        writeln!(
            f,
            "By tier:         {} excellent / {} good / {} fair / {} poor",
            self.excellent, self.good, self.fair, self.poor
        )?;
        writeln!(f, "Value-balanced:  {}", self.value_balanced)?;
        writeln!(f, "Avg score:       {:.3}", self.average_total_score)?;
        writeln!(f, "Avg trust:       {:.3}", self.average_trust_score)?;
        writeln!(f, "Avg balance:     {:.3}", self.average_value_balance_score)?;
        writeln!(f, "Avg length:      {:.1}", self.average_cycle_length)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn opp(score: f64, tier: QualityTier, balanced: bool) -> Opportunity {
        Opportunity {
            key: format!("k{}", score),
            nodes: Vec::new(),
            total_score: score,
            is_value_balanced: balanced,
            max_value_deviation: Decimal::ZERO,
            value_balance_score: 1.0,
            trust_score: score,
            location_score: 1.0,
            category_score: 1.0,
            tier,
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_stats() {
        let stats = OpportunityStats::from_opportunities(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_total_score, 0.0);
    }

    #[test]
    fn test_tier_counts_and_averages() {
        let opps = vec![
            opp(0.9, QualityTier::Excellent, true),
            opp(0.8, QualityTier::Good, true),
            opp(0.4, QualityTier::Poor, false),
        ];
        let stats = OpportunityStats::from_opportunities(&opps);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.count(QualityTier::Excellent), 1);
        assert_eq!(stats.count(QualityTier::Good), 1);
        assert_eq!(stats.count(QualityTier::Fair), 0);
        assert_eq!(stats.count(QualityTier::Poor), 1);
        assert_eq!(stats.value_balanced, 2);
        assert_relative_eq!(stats.average_total_score, 0.7, epsilon = 1e-9);
    }
}
