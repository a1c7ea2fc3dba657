//! Transaction type: an immutable transfer or trade between two ledger legs.

use crate::domain::{Account, Currency, Decimal, TimeMs};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of transaction as recorded by the ingesting system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Exchange of one currency for another.
    Trade,
    /// Movement of a currency into or out of the ledger.
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Trade => "trade",
            TransactionType::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trade" => Ok(TransactionType::Trade),
            "transfer" => Ok(TransactionType::Transfer),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

/// A single recorded transaction.
///
/// `usd_value` and `fee` are denominated in the valuation currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub kind: TransactionType,
    /// Correlation id from the originating system (e.g. `<trade_id>:<order_id>`).
    pub external_id: Option<String>,
    pub from_account: Account,
    pub from_currency: Currency,
    pub from_amount: Decimal,
    pub to_account: Account,
    pub to_currency: Currency,
    pub to_amount: Decimal,
    pub usd_value: Decimal,
    pub fee: Decimal,
    pub transacted_at: TimeMs,
}

impl Transaction {
    /// Whether either leg touches the `External` counterparty.
    pub fn touches_external(&self) -> bool {
        self.from_account.is_external() || self.to_account.is_external()
    }

    /// Both legs name the same currency without either being External,
    /// so no gain is definable.
    pub fn is_degenerate(&self) -> bool {
        self.from_currency == self.to_currency && !self.touches_external()
    }

    /// True when `currency` flows into the ledger account with this transaction.
    pub fn acquires(&self, currency: &Currency) -> bool {
        &self.to_currency == currency
            && (self.from_account == self.to_account || self.from_account.is_external())
    }

    /// True when `currency` flows out of the ledger account with this transaction.
    pub fn disposes(&self, currency: &Currency) -> bool {
        &self.from_currency == currency
            && (self.from_account == self.to_account || self.to_account.is_external())
    }
}

/// A transaction as submitted for ingestion, before the ledger assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub kind: TransactionType,
    pub external_id: Option<String>,
    pub from_account: Account,
    pub from_currency: Currency,
    pub from_amount: Decimal,
    pub to_account: Account,
    pub to_currency: Currency,
    pub to_amount: Decimal,
    pub usd_value: Decimal,
    pub fee: Decimal,
    pub transacted_at: TimeMs,
}

impl NewTransaction {
    pub fn with_id(self, id: i64) -> Transaction {
        Transaction {
            id,
            kind: self.kind,
            external_id: self.external_id,
            from_account: self.from_account,
            from_currency: self.from_currency,
            from_amount: self.from_amount,
            to_account: self.to_account,
            to_currency: self.to_currency,
            to_amount: self.to_amount,
            usd_value: self.usd_value,
            fee: self.fee,
            transacted_at: self.transacted_at,
        }
    }
}
