//! Coinbase Exchange candle-based price oracle.

use super::{select_price_point, PriceError, PriceOracle, DEFAULT_PRICE_TOLERANCE_MS};
use crate::domain::{Currency, Decimal, TimeMs};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use rust_decimal::Decimal as RustDecimal;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Half-width of the candle request window around the requested instant.
const CANDLE_WINDOW_MS: i64 = 150 * 60 * 1000;
/// One-minute candles.
const CANDLE_GRANULARITY_SECS: i64 = 60;

/// Price oracle reading one-minute candles from the public Coinbase Exchange API.
#[derive(Debug, Clone)]
pub struct CoinbasePriceOracle {
    client: Client,
    base_url: String,
    valuation_currency: Currency,
    tolerance_ms: i64,
}

impl CoinbasePriceOracle {
    pub fn new(base_url: String, valuation_currency: Currency) -> Self {
        Self {
            client: Client::new(),
            base_url,
            valuation_currency,
            tolerance_ms: DEFAULT_PRICE_TOLERANCE_MS,
        }
    }

    /// Create with the default Coinbase Exchange API URL.
    pub fn default_url(valuation_currency: Currency) -> Self {
        Self::new(
            "https://api.exchange.coinbase.com".to_string(),
            valuation_currency,
        )
    }

    pub fn with_tolerance_ms(mut self, tolerance_ms: i64) -> Self {
        self.tolerance_ms = tolerance_ms;
        self
    }

    fn candles_url(&self, currency: &Currency, at: TimeMs) -> String {
        let start = TimeMs::new(at.as_ms() - CANDLE_WINDOW_MS);
        let end = TimeMs::new(at.as_ms() + CANDLE_WINDOW_MS);
        format!(
            "{}/products/{}-{}/candles?granularity={}&start={}&end={}",
            self.base_url,
            currency,
            self.valuation_currency,
            CANDLE_GRANULARITY_SECS,
            start.to_rfc3339(),
            end.to_rfc3339()
        )
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, PriceError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(url)
                .header("User-Agent", "capgains")
                .send()
                .await
                .map_err(|e| backoff::Error::transient(PriceError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(PriceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(PriceError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(PriceError::Http {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(PriceError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl PriceOracle for CoinbasePriceOracle {
    async fn get_price(&self, currency: &Currency, at: TimeMs) -> Result<Decimal, PriceError> {
        let url = self.candles_url(currency, at);
        debug!(currency = %currency, at = %at, "Fetching candles");

        let response = self.get_json(&url).await?;
        let candles = parse_candles(&response)?;
        if candles.is_empty() {
            return Err(PriceError::unavailable(currency, at, "no candles returned"));
        }

        select_price_point(candles, at, self.tolerance_ms)
            .map(|(_, close)| close)
            .ok_or_else(|| {
                PriceError::unavailable(
                    currency,
                    at,
                    format!("no candle within {}ms before requested time", self.tolerance_ms),
                )
            })
    }
}

/// Parse `[[time_secs, low, high, open, close, volume], ...]` into
/// `(candle start, close)` pairs.
fn parse_candles(response: &serde_json::Value) -> Result<Vec<(TimeMs, Decimal)>, PriceError> {
    let rows = response
        .as_array()
        .ok_or_else(|| PriceError::Parse("Expected array response".to_string()))?;

    rows.iter()
        .map(|row| {
            let fields = row
                .as_array()
                .filter(|f| f.len() >= 5)
                .ok_or_else(|| PriceError::Parse("Malformed candle".to_string()))?;
            let time_secs = fields[0]
                .as_i64()
                .ok_or_else(|| PriceError::Parse("Missing candle time".to_string()))?;
            let close = decimal_from_json(&fields[4])?;
            Ok((TimeMs::new(time_secs * 1000), close))
        })
        .collect()
}

fn decimal_from_json(value: &serde_json::Value) -> Result<Decimal, PriceError> {
    let text = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        other => return Err(PriceError::Parse(format!("Invalid price: {}", other))),
    };
    RustDecimal::from_str(&text)
        .or_else(|_| RustDecimal::from_scientific(&text))
        .map(Decimal::from)
        .map_err(|e| PriceError::Parse(format!("Invalid price {}: {}", text, e)))
}
