use crate::domain::{Currency, Decimal, TimeMs};
use serde::{Deserialize, Serialize};

/// An acquisition that has not yet been fully disposed of.
///
/// Prices and fees are per unit in the valuation currency. `remaining`
/// starts at `original_quantity` and only ever decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub transaction_id: i64,
    pub currency: Currency,
    pub original_quantity: Decimal,
    pub unit_price: Decimal,
    pub unit_fee: Decimal,
    pub acquired_at: TimeMs,
    remaining: Decimal,
}

impl Lot {
    pub fn new(
        transaction_id: i64,
        currency: Currency,
        quantity: Decimal,
        unit_price: Decimal,
        unit_fee: Decimal,
        acquired_at: TimeMs,
    ) -> Self {
        Self {
            transaction_id,
            currency,
            original_quantity: quantity,
            unit_price,
            unit_fee,
            acquired_at,
            remaining: quantity,
        }
    }

    pub fn remaining(&self) -> Decimal {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Remove `quantity` from the lot. Callers match at most `remaining`.
    pub(crate) fn consume(&mut self, quantity: Decimal) {
        debug_assert!(quantity <= self.remaining);
        self.remaining -= quantity;
    }
}
