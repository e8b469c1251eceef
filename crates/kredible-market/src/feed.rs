//! Collateral price feed
//!
//! A single number: the collateral asset's price in the loan currency.
//! Collateral sizing reads it once at request time; the locked amount never
//! re-adjusts to later price moves.

use async_trait::async_trait;
use parking_lot::RwLock;

use kredible_common::{KredibleError, Result};

/// Source of the collateral asset price
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Current price, guaranteed positive
    async fn price(&self) -> Result<f64>;
}

/// Fixed price slot, adjustable by the embedder and by tests
#[derive(Debug)]
pub struct FixedPriceFeed {
    price: RwLock<f64>,
}

impl FixedPriceFeed {
    pub fn new(price: f64) -> Self {
        Self {
            price: RwLock::new(price),
        }
    }

    /// Move the fixed price
    pub fn set(&self, price: f64) {
        *self.price.write() = price;
    }
}

#[async_trait]
impl PriceFeed for FixedPriceFeed {
    async fn price(&self) -> Result<f64> {
        let price = *self.price.read();
        if price <= 0.0 {
            return Err(KredibleError::invalid_input(format!(
                "collateral price must be positive, got {price}"
            )));
        }
        Ok(price)
    }
}
