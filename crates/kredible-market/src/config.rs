//! Market configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};

use kredible_common::{DEFAULT_MAX_LTV, SCORE_MAX_AGE_DAYS};

/// Market service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Collateral asset price used by the fixed feed
    pub collateral_price: f64,
    /// LTV ceiling advertised on offer-derived listings (percent)
    pub default_max_ltv: f64,
    /// Page size for market listings
    pub listing_limit: usize,
    /// Days a cached credit score stays fresh
    pub score_max_age_days: i64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            collateral_price: 0.12,
            default_max_ltv: DEFAULT_MAX_LTV,
            listing_limit: 20,
            score_max_age_days: SCORE_MAX_AGE_DAYS,
        }
    }
}

impl MarketConfig {
    /// Load configuration from environment and .env file
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Ok(val) = std::env::var("KREDIBLE_COLLATERAL_PRICE") {
            if let Ok(v) = val.parse() {
                cfg.collateral_price = v;
            }
        }
        if let Ok(val) = std::env::var("KREDIBLE_DEFAULT_MAX_LTV") {
            if let Ok(v) = val.parse() {
                cfg.default_max_ltv = v;
            }
        }
        if let Ok(val) = std::env::var("KREDIBLE_LISTING_LIMIT") {
            if let Ok(v) = val.parse() {
                cfg.listing_limit = v;
            }
        }
        if let Ok(val) = std::env::var("KREDIBLE_SCORE_MAX_AGE_DAYS") {
            if let Ok(v) = val.parse() {
                cfg.score_max_age_days = v;
            }
        }

        Ok(cfg)
    }
}
