//! Price oracle abstraction for marking open lots to market.

use crate::domain::{Currency, Decimal, TimeMs};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod coinbase;
pub mod fixed;

pub use coinbase::CoinbasePriceOracle;
pub use fixed::StaticPriceOracle;

/// Default maximum distance between a price point and the requested instant.
pub const DEFAULT_PRICE_TOLERANCE_MS: i64 = 5 * 60 * 1000;

/// Looks up the valuation-currency price of a currency at an instant.
///
/// Implementations choose the latest price point at or before `at` and fail
/// with `PriceError::Unavailable` when it is further than their tolerance.
#[async_trait]
pub trait PriceOracle: Send + Sync + fmt::Debug {
    async fn get_price(&self, currency: &Currency, at: TimeMs) -> Result<Decimal, PriceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// No price point lies within tolerance of the requested instant.
    #[error("no {currency} price available at {at}: {reason}")]
    Unavailable {
        currency: Currency,
        at: TimeMs,
        reason: String,
    },
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Rate limited")]
    RateLimited,
}

impl PriceError {
    pub fn unavailable(currency: &Currency, at: TimeMs, reason: impl Into<String>) -> Self {
        PriceError::Unavailable {
            currency: currency.clone(),
            at,
            reason: reason.into(),
        }
    }
}

/// Pick the latest `(time, price)` point at or before `at` within `tolerance_ms`.
///
/// `points` need not be sorted.
pub(crate) fn select_price_point(
    points: impl IntoIterator<Item = (TimeMs, Decimal)>,
    at: TimeMs,
    tolerance_ms: i64,
) -> Option<(TimeMs, Decimal)> {
    points
        .into_iter()
        .filter(|(t, _)| *t <= at)
        .max_by_key(|(t, _)| *t)
        .filter(|(t, _)| at.since(*t) <= tolerance_ms)
}
