//! Pure computation engine for deterministic FIFO lot matching.

use crate::domain::{Currency, Decimal, TimeMs, DAY_MS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregator;
pub mod lot;
pub mod portfolio;
pub mod snapshot;
pub mod wallet;

pub use aggregator::{GainAggregator, TermBucket, TimeRange};
pub use lot::Lot;
pub use portfolio::{Holding, Portfolio};
pub use snapshot::{EncodedSnapshot, SnapshotCodecError, SNAPSHOT_VERSION};
pub use wallet::VirtualWallet;

/// Holding period at or beyond which a disposal is long-term.
pub const LONG_TERM_THRESHOLD_MS: i64 = 365 * DAY_MS;

/// Holding-period classification of a realized gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    ShortTerm,
    LongTerm,
}

impl Term {
    /// Short-term iff the holding period is strictly less than 365 days.
    pub fn classify(acquired_at: TimeMs, disposed_at: TimeMs) -> Self {
        if disposed_at.since(acquired_at) < LONG_TERM_THRESHOLD_MS {
            Term::ShortTerm
        } else {
            Term::LongTerm
        }
    }

    pub fn is_short_term(&self) -> bool {
        matches!(self, Term::ShortTerm)
    }
}

/// A realized gain produced by matching part of one lot against a disposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainEvent {
    /// Transaction that created the consumed lot.
    pub buy_transaction_id: i64,
    /// Disposing transaction.
    pub sell_transaction_id: i64,
    pub currency: Currency,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub proceeds: Decimal,
    pub gain: Decimal,
    pub acquired_at: TimeMs,
    pub disposed_at: TimeMs,
    pub term: Term,
}

/// Reason a transaction was rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationKind {
    #[error("from and to currency are both {currency} and neither leg is External")]
    SameCurrency { currency: Currency },
    #[error("{currency} leg has non-positive quantity")]
    NonPositiveQuantity { currency: Currency },
    #[error("transacted before portfolio as-of time {as_of}")]
    OutOfOrder { as_of: TimeMs },
}

/// Errors raised while matching transactions against wallets.
///
/// Every variant names the offending transaction so the gap can be
/// reconciled by hand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid transaction {transaction_id} at {transacted_at}: {kind}")]
    Validation {
        transaction_id: i64,
        transacted_at: TimeMs,
        kind: ValidationKind,
    },
    #[error("transaction {transaction_id} at {transacted_at} does not involve {currency}")]
    Scope {
        transaction_id: i64,
        currency: Currency,
        transacted_at: TimeMs,
    },
    #[error(
        "insufficient lots to match transaction {transaction_id} at {transacted_at}: \
         {requested} {currency} requested, {available} available"
    )]
    InsufficientLots {
        transaction_id: i64,
        currency: Currency,
        transacted_at: TimeMs,
        requested: Decimal,
        available: Decimal,
    },
}

impl LedgerError {
    pub fn transaction_id(&self) -> i64 {
        match self {
            LedgerError::Validation { transaction_id, .. }
            | LedgerError::Scope { transaction_id, .. }
            | LedgerError::InsufficientLots { transaction_id, .. } => *transaction_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_boundary() {
        let acquired = TimeMs::new(1_000);
        assert_eq!(
            Term::classify(acquired, TimeMs::new(1_000 + 364 * DAY_MS)),
            Term::ShortTerm
        );
        assert_eq!(
            Term::classify(acquired, TimeMs::new(1_000 + 365 * DAY_MS - 1)),
            Term::ShortTerm
        );
        assert_eq!(
            Term::classify(acquired, TimeMs::new(1_000 + 365 * DAY_MS)),
            Term::LongTerm
        );
    }

    #[test]
    fn test_insufficient_lots_message_names_transaction() {
        let err = LedgerError::InsufficientLots {
            transaction_id: 42,
            currency: Currency::new("BTC"),
            transacted_at: TimeMs::new(0),
            requested: Decimal::from(5),
            available: Decimal::from(3),
        };
        let msg = err.to_string();
        assert!(msg.contains("transaction 42"));
        assert!(msg.contains("5 BTC requested, 3 available"));
        assert_eq!(err.transaction_id(), 42);
    }
}
