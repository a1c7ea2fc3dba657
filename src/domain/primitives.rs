//! Domain primitives: TimeMs, Currency, Scope, Account.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds in one day.
pub const DAY_MS: i64 = 86_400_000;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`.
    pub fn since(&self, earlier: TimeMs) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// RFC 3339 rendering in UTC with millisecond precision.
    pub fn to_rfc3339(&self) -> String {
        match DateTime::<Utc>::from_timestamp_millis(self.0) {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            None => self.0.to_string(),
        }
    }

    /// Parse an RFC 3339 timestamp (e.g. `2019-01-19T13:59:12.562Z`).
    pub fn parse_rfc3339(s: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s.trim()).map(|dt| TimeMs(dt.timestamp_millis()))
    }
}

impl std::fmt::Display for TimeMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

/// Currency/asset symbol (e.g., "BTC", "USD"). Always upper-case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(symbol: impl Into<String>) -> Self {
        Currency(symbol.into().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Currency {
    fn from(value: String) -> Self {
        Currency::new(value)
    }
}

impl From<&str> for Currency {
    fn from(value: &str) -> Self {
        Currency::new(value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Portfolio scope tag (e.g. "business", "personal").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope(pub String);

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Scope(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger account holding one leg of a transaction.
///
/// `External` is the counterparty outside the tracked ledger: deposits come
/// from it and withdrawals go to it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Account {
    External,
    Named(String),
}

impl Account {
    const EXTERNAL: &'static str = "External";

    pub fn named(name: impl Into<String>) -> Self {
        Account::from(name.into())
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Account::External)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Account::External => Self::EXTERNAL,
            Account::Named(name) => name,
        }
    }
}

impl From<String> for Account {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case(Self::EXTERNAL) {
            Account::External
        } else {
            Account::Named(trimmed.to_string())
        }
    }
}

impl From<Account> for String {
    fn from(value: Account) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_is_uppercased() {
        assert_eq!(Currency::new(" btc ").as_str(), "BTC");
        assert_eq!(Currency::from("eth"), Currency::new("ETH"));
    }

    #[test]
    fn test_account_external_marker() {
        assert_eq!(Account::named("External"), Account::External);
        assert_eq!(Account::named("external"), Account::External);
        assert!(!Account::named("Coinbase").is_external());
        assert_eq!(Account::External.to_string(), "External");
    }

    #[test]
    fn test_account_serialization() {
        let json = serde_json::to_string(&Account::External).unwrap();
        assert_eq!(json, "\"External\"");

        let acct: Account = serde_json::from_str("\"CoinbasePrime\"").unwrap();
        assert_eq!(acct, Account::Named("CoinbasePrime".to_string()));
    }

    #[test]
    fn test_timems_rfc3339_roundtrip() {
        let t = TimeMs::parse_rfc3339("2019-01-19T13:59:12.562Z").unwrap();
        assert_eq!(t.as_ms(), 1_547_906_352_562);
        assert_eq!(t.to_rfc3339(), "2019-01-19T13:59:12.562Z");
    }

    #[test]
    fn test_timems_since() {
        let t1 = TimeMs::new(1_000);
        let t2 = TimeMs::new(1_000 + 365 * DAY_MS);
        assert_eq!(t2.since(t1), 365 * DAY_MS);
        assert!(t1 < t2);
    }
}
