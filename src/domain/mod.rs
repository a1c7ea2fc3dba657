//! Domain types and determinism layer for the capital gains ledger.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: TimeMs, Currency, Scope, Account
//! - The Transaction input record
//! - Stable transaction ordering key for deterministic replay

pub mod decimal;
pub mod ordering;
pub mod primitives;
pub mod transaction;

pub use decimal::Decimal;
pub use ordering::{sort_transactions_deterministic, TransactionOrderingKey};
pub use primitives::{Account, Currency, Scope, TimeMs, DAY_MS};
pub use transaction::{NewTransaction, Transaction, TransactionType};
