//! Credit tiers and scoring types
//!
//! A credit score in the 300-850 range resolves to one of four risk tiers.
//! The tier fixes the borrower's terms:
//! - LTV ceiling: how much can be borrowed against locked collateral
//! - APR floor: the annualized rate applied to the principal
//!
//! Tier boundaries are closed on the lower bound, so every score maps to
//! exactly one tier.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{KredibleError, Result};
use crate::{MAX_CREDIT_SCORE, MIN_CREDIT_SCORE};

/// Lowest APR offered, reached by the best scores (percent, annualized)
pub const MIN_APR: f64 = 6.0;

/// Highest APR offered, reached by the worst scores
pub const MAX_APR: f64 = 9.0;

/// Risk band derived from a credit score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditTier {
    /// score < 500: LTV 50%, APR 9.0%
    Low,
    /// 500 <= score < 600: LTV 60%, APR 8.0%
    Mid,
    /// 600 <= score < 700: LTV 70%, APR 7.0%
    MidHigh,
    /// score >= 700: LTV 80%, APR 6.0%
    High,
}

impl CreditTier {
    /// Resolve the tier for a score. Total over all inputs.
    pub fn for_score(score: u16) -> Self {
        if score >= 700 {
            CreditTier::High
        } else if score >= 600 {
            CreditTier::MidHigh
        } else if score >= 500 {
            CreditTier::Mid
        } else {
            CreditTier::Low
        }
    }

    /// LTV ceiling for this tier (percent)
    pub fn ltv(&self) -> f64 {
        match self {
            CreditTier::High => 80.0,
            CreditTier::MidHigh => 70.0,
            CreditTier::Mid => 60.0,
            CreditTier::Low => 50.0,
        }
    }

    /// APR floor for this tier (percent, annualized)
    pub fn apr(&self) -> f64 {
        match self {
            CreditTier::High => 6.0,
            CreditTier::MidHigh => 7.0,
            CreditTier::Mid => 8.0,
            CreditTier::Low => 9.0,
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            CreditTier::High => "High",
            CreditTier::MidHigh => "Mid-High",
            CreditTier::Mid => "Mid",
            CreditTier::Low => "Low",
        }
    }
}

impl std::fmt::Display for CreditTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Units of collateral asset required to secure a loan.
///
/// `collateral = amount / (ltv / 100) / price`, where `price` is the
/// collateral asset's value in the loan currency. The result is fixed at
/// request time; no rounding is applied at this layer.
pub fn collateral_for(amount: Decimal, ltv: f64, price: f64) -> Result<f64> {
    if amount <= Decimal::ZERO {
        return Err(KredibleError::invalid_input("loan amount must be positive"));
    }
    if !(ltv > 0.0 && ltv <= 100.0) {
        return Err(KredibleError::invalid_input(format!(
            "ltv must be within (0, 100], got {ltv}"
        )));
    }
    if price <= 0.0 {
        return Err(KredibleError::invalid_input(format!(
            "collateral price must be positive, got {price}"
        )));
    }

    let amount = amount
        .to_f64()
        .ok_or_else(|| KredibleError::invalid_input("loan amount is not representable"))?;
    Ok(amount / (ltv / 100.0) / price)
}

/// Linear APR over the full score range: the best score gets [`MIN_APR`],
/// the worst [`MAX_APR`]. Scores outside the range are clamped.
///
/// Used for display alongside the stepped tier APRs.
pub fn normalized_apr(score: u16) -> f64 {
    let span = f64::from(MAX_CREDIT_SCORE - MIN_CREDIT_SCORE);
    let t = ((f64::from(score) - f64::from(MIN_CREDIT_SCORE)) / span).clamp(0.0, 1.0);
    MAX_APR - t * (MAX_APR - MIN_APR)
}

/// Display descriptor for a score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBand {
    pub label: &'static str,
    pub description: &'static str,
}

/// Coarse band a score falls into, for presentation
pub fn score_band(score: u16) -> ScoreBand {
    if score >= 800 {
        ScoreBand {
            label: "Excellent",
            description: "Very low risk borrower",
        }
    } else if score >= 740 {
        ScoreBand {
            label: "Very Good",
            description: "Low risk borrower",
        }
    } else if score >= 670 {
        ScoreBand {
            label: "Good",
            description: "Moderate risk borrower",
        }
    } else if score >= 580 {
        ScoreBand {
            label: "Fair",
            description: "Higher risk borrower",
        }
    } else {
        ScoreBand {
            label: "Poor",
            description: "High risk borrower",
        }
    }
}

/// Direction a factor pushed the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Positive,
    Negative,
    Neutral,
}

/// One named component of a computed credit score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditFactor {
    /// Factor name (e.g. "Payment History")
    pub name: String,
    /// Direction of the contribution
    pub impact: Impact,
    /// Human-readable explanation
    pub description: String,
    /// Raw sub-score before weighting
    pub value: f64,
}

impl CreditFactor {
    pub fn new(
        name: impl Into<String>,
        impact: Impact,
        description: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            name: name.into(),
            impact,
            description: description.into(),
            value,
        }
    }
}

/// Computed credit score with its full factor breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditScore {
    /// Composite score, clamped to 300-850
    pub score: u16,

    /// Top of the published range (850)
    pub max_score: u16,

    /// Component breakdown for display and audit
    pub factors: Vec<CreditFactor>,

    /// When the score was computed
    pub last_updated: DateTime<Utc>,
}

impl CreditScore {
    /// Create a score, clamping into the published range
    pub fn new(score: u16, factors: Vec<CreditFactor>) -> Self {
        Self {
            score: score.clamp(MIN_CREDIT_SCORE, MAX_CREDIT_SCORE),
            max_score: MAX_CREDIT_SCORE,
            factors,
            last_updated: Utc::now(),
        }
    }

    /// Tier this score resolves to
    pub fn tier(&self) -> CreditTier {
        CreditTier::for_score(self.score)
    }
}

impl std::fmt::Display for CreditScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CreditScore({}/{}, tier={})",
            self.score,
            self.max_score,
            self.tier()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tier_boundaries_closed_on_lower_bound() {
        assert_eq!(CreditTier::for_score(700), CreditTier::High);
        assert_eq!(CreditTier::for_score(699), CreditTier::MidHigh);
        assert_eq!(CreditTier::for_score(600), CreditTier::MidHigh);
        assert_eq!(CreditTier::for_score(599), CreditTier::Mid);
        assert_eq!(CreditTier::for_score(500), CreditTier::Mid);
        assert_eq!(CreditTier::for_score(499), CreditTier::Low);
    }

    #[test]
    fn test_tier_is_total() {
        for score in 0..=1000u16 {
            // Must resolve without panicking, and terms must be consistent
            let tier = CreditTier::for_score(score);
            assert!(tier.ltv() >= 50.0 && tier.ltv() <= 80.0);
            assert!(tier.apr() >= 6.0 && tier.apr() <= 9.0);
        }
    }

    #[test]
    fn test_tier_terms() {
        assert_eq!(CreditTier::High.ltv(), 80.0);
        assert_eq!(CreditTier::High.apr(), 6.0);
        assert_eq!(CreditTier::Low.ltv(), 50.0);
        assert_eq!(CreditTier::Low.apr(), 9.0);
    }

    #[test]
    fn test_collateral_calculation() {
        let collateral = collateral_for(dec!(1000), 70.0, 0.12).unwrap();
        assert!((collateral - 11904.76).abs() < 0.01);
    }

    #[test]
    fn test_collateral_rejects_bad_inputs() {
        assert!(matches!(
            collateral_for(dec!(0), 70.0, 0.12),
            Err(KredibleError::InvalidInput(_))
        ));
        assert!(matches!(
            collateral_for(dec!(1000), 0.0, 0.12),
            Err(KredibleError::InvalidInput(_))
        ));
        assert!(matches!(
            collateral_for(dec!(1000), 70.0, 0.0),
            Err(KredibleError::InvalidInput(_))
        ));
        assert!(matches!(
            collateral_for(dec!(1000), 70.0, -1.0),
            Err(KredibleError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_normalized_apr_endpoints() {
        assert!((normalized_apr(MIN_CREDIT_SCORE) - MAX_APR).abs() < f64::EPSILON);
        assert!((normalized_apr(MAX_CREDIT_SCORE) - MIN_APR).abs() < f64::EPSILON);
        // Clamped outside the range
        assert!((normalized_apr(0) - MAX_APR).abs() < f64::EPSILON);
        assert!((normalized_apr(1000) - MIN_APR).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalized_apr_is_monotonic() {
        let mut prev = normalized_apr(MIN_CREDIT_SCORE);
        for score in (MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE).step_by(25) {
            let apr = normalized_apr(score);
            assert!(apr <= prev);
            prev = apr;
        }
    }

    #[test]
    fn test_score_band() {
        assert_eq!(score_band(820).label, "Excellent");
        assert_eq!(score_band(750).label, "Very Good");
        assert_eq!(score_band(700).label, "Good");
        assert_eq!(score_band(600).label, "Fair");
        assert_eq!(score_band(450).label, "Poor");
    }

    #[test]
    fn test_credit_score_clamps() {
        let score = CreditScore::new(900, vec![]);
        assert_eq!(score.score, MAX_CREDIT_SCORE);
        let score = CreditScore::new(100, vec![]);
        assert_eq!(score.score, MIN_CREDIT_SCORE);
    }
}
