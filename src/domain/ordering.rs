//! Stable transaction ordering for deterministic replay.

use crate::domain::{TimeMs, Transaction};
use serde::{Deserialize, Serialize};

/// Stable ordering key for transactions.
///
/// Ordering: transacted_at -> id. Two transactions at the same instant are
/// replayed in id order so that reruns route identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionOrderingKey {
    pub transacted_at: TimeMs,
    pub id: i64,
}

impl TransactionOrderingKey {
    pub fn from_transaction(transaction: &Transaction) -> Self {
        TransactionOrderingKey {
            transacted_at: transaction.transacted_at,
            id: transaction.id,
        }
    }
}

/// Sort transactions deterministically.
pub fn sort_transactions_deterministic(transactions: &mut [Transaction]) {
    transactions.sort_by_key(TransactionOrderingKey::from_transaction);
}
