use crate::datasource::ScopeFilter;
use crate::domain::{Account, Currency, Scope};
use crate::pipeline::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::pricing::DEFAULT_PRICE_TOLERANCE_MS;
use std::collections::HashMap;
use thiserror::Error;

const DEFAULT_SCOPE_FILTERS: &str = "business=only:CoinbasePrime,personal=exclude:CoinbasePrime";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub price_api_url: String,
    pub valuation_currency: Currency,
    pub price_tolerance_ms: i64,
    pub page_size: usize,
    pub scope_filters: HashMap<Scope, ScopeFilter>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let price_api_url = env_map
            .get("PRICE_API_URL")
            .cloned()
            .unwrap_or_else(|| "https://api.exchange.coinbase.com".to_string());

        let valuation_currency = match env_map.get("VALUATION_CURRENCY").map(|s| s.trim()) {
            None => Currency::new("USD"),
            Some(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()) => {
                Currency::new(s)
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "VALUATION_CURRENCY".to_string(),
                    format!("must be an alphanumeric symbol, got {:?}", other),
                ))
            }
        };

        let price_tolerance_ms = match env_map.get("PRICE_TOLERANCE_MS") {
            None => DEFAULT_PRICE_TOLERANCE_MS,
            Some(s) => s
                .parse::<i64>()
                .ok()
                .filter(|v| *v >= 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "PRICE_TOLERANCE_MS".to_string(),
                        "must be a non-negative integer".to_string(),
                    )
                })?,
        };

        let page_size = match env_map.get("PAGE_SIZE") {
            None => DEFAULT_PAGE_SIZE,
            Some(s) => s
                .parse::<usize>()
                .ok()
                .filter(|v| (1..=MAX_PAGE_SIZE).contains(v))
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "PAGE_SIZE".to_string(),
                        format!("must be an integer between 1 and {}", MAX_PAGE_SIZE),
                    )
                })?,
        };

        let scope_filters = parse_scope_filters(
            env_map
                .get("SCOPE_FILTERS")
                .map(|s| s.as_str())
                .unwrap_or(DEFAULT_SCOPE_FILTERS),
        )?;

        Ok(Config {
            port,
            database_path,
            price_api_url,
            valuation_currency,
            price_tolerance_ms,
            page_size,
            scope_filters,
        })
    }

    pub fn is_known_scope(&self, scope: &Scope) -> bool {
        self.scope_filters.contains_key(scope)
    }
}

/// Parse `name=all|only:<account>|exclude:<account>` entries separated by commas.
fn parse_scope_filters(input: &str) -> Result<HashMap<Scope, ScopeFilter>, ConfigError> {
    let invalid = |msg: String| ConfigError::InvalidValue("SCOPE_FILTERS".to_string(), msg);

    let mut filters = HashMap::new();
    for entry in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, rule) = entry
            .split_once('=')
            .ok_or_else(|| invalid(format!("expected name=rule, got {}", entry)))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid(format!("empty scope name in {}", entry)));
        }

        let filter = match rule.trim().split_once(':') {
            None if rule.trim() == "all" => ScopeFilter::All,
            Some(("only", account)) if !account.trim().is_empty() => {
                ScopeFilter::OnlyAccount(Account::named(account))
            }
            Some(("exclude", account)) if !account.trim().is_empty() => {
                ScopeFilter::ExcludeAccount(Account::named(account))
            }
            _ => {
                return Err(invalid(format!(
                    "rule must be all, only:<account> or exclude:<account>, got {}",
                    rule
                )))
            }
        };

        if filters.insert(Scope::new(name), filter).is_some() {
            return Err(invalid(format!("duplicate scope {}", name)));
        }
    }

    if filters.is_empty() {
        return Err(invalid("at least one scope is required".to_string()));
    }
    Ok(filters)
}
