//! In-memory price table.

use super::{select_price_point, PriceError, PriceOracle, DEFAULT_PRICE_TOLERANCE_MS};
use crate::domain::{Currency, Decimal, TimeMs};
use async_trait::async_trait;
use std::collections::HashMap;

/// Price oracle backed by a fixed table of price points.
#[derive(Debug, Clone)]
pub struct StaticPriceOracle {
    prices: HashMap<Currency, Vec<(TimeMs, Decimal)>>,
    tolerance_ms: i64,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
            tolerance_ms: DEFAULT_PRICE_TOLERANCE_MS,
        }
    }

    pub fn with_tolerance_ms(mut self, tolerance_ms: i64) -> Self {
        self.tolerance_ms = tolerance_ms;
        self
    }

    /// Add a price point for a currency.
    pub fn with_price(mut self, currency: Currency, at: TimeMs, price: Decimal) -> Self {
        self.prices.entry(currency).or_default().push((at, price));
        self
    }
}

impl Default for StaticPriceOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn get_price(&self, currency: &Currency, at: TimeMs) -> Result<Decimal, PriceError> {
        let points = self
            .prices
            .get(currency)
            .ok_or_else(|| PriceError::unavailable(currency, at, "no price points recorded"))?;

        select_price_point(points.iter().copied(), at, self.tolerance_ms)
            .map(|(_, price)| price)
            .ok_or_else(|| {
                PriceError::unavailable(
                    currency,
                    at,
                    format!("no price point within {}ms", self.tolerance_ms),
                )
            })
    }
}
