use crate::domain::{Currency, Decimal, TimeMs, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{GainEvent, LedgerError, Lot, Term, ValidationKind};

/// FIFO queue of open lots for a single currency.
///
/// Lots are kept in acquisition order. Once `process` returns, no lot with
/// zero remaining quantity is left in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualWallet {
    currency: Currency,
    last_processed: TimeMs,
    lots: VecDeque<Lot>,
}

/// Outcome of classifying a transaction against a wallet, computed without
/// mutating the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlannedChange {
    Acquire(Lot),
    Dispose(DisposalPlan),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DisposalPlan {
    unit_price: Decimal,
    unit_fee: Decimal,
    /// (index into the lot queue, matched quantity), front to back.
    matches: Vec<(usize, Decimal)>,
}

impl VirtualWallet {
    pub fn new(currency: Currency, time: TimeMs) -> Self {
        Self {
            currency,
            last_processed: time,
            lots: VecDeque::new(),
        }
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn last_processed(&self) -> TimeMs {
        self.last_processed
    }

    /// Open lots, oldest first.
    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    pub fn lot_count(&self) -> usize {
        self.lots.len()
    }

    /// Apply a transaction to this wallet and return the realized gains.
    ///
    /// On error the wallet is left exactly as it was.
    pub fn process(&mut self, transaction: &Transaction) -> Result<Vec<GainEvent>, LedgerError> {
        let change = self.plan(transaction)?;
        Ok(self.commit(transaction, change))
    }

    /// Classify `transaction` and compute its effect without touching any lot.
    pub(crate) fn plan(&self, transaction: &Transaction) -> Result<PlannedChange, LedgerError> {
        if transaction.is_degenerate() {
            return Err(self.validation(
                transaction,
                ValidationKind::SameCurrency {
                    currency: transaction.from_currency.clone(),
                },
            ));
        }

        if transaction.acquires(&self.currency) {
            let quantity = transaction.to_amount;
            let (unit_price, unit_fee) = self.per_unit(transaction, quantity)?;
            Ok(PlannedChange::Acquire(Lot::new(
                transaction.id,
                self.currency.clone(),
                quantity,
                unit_price,
                unit_fee,
                transaction.transacted_at,
            )))
        } else if transaction.disposes(&self.currency) {
            let quantity = transaction.from_amount;
            let (unit_price, unit_fee) = self.per_unit(transaction, quantity)?;
            let matches = self.plan_matches(transaction, quantity)?;
            Ok(PlannedChange::Dispose(DisposalPlan {
                unit_price,
                unit_fee,
                matches,
            }))
        } else {
            Err(LedgerError::Scope {
                transaction_id: transaction.id,
                currency: self.currency.clone(),
                transacted_at: transaction.transacted_at,
            })
        }
    }

    /// Apply a change produced by `plan` against the same wallet state.
    pub(crate) fn commit(&mut self, transaction: &Transaction, change: PlannedChange) -> Vec<GainEvent> {
        let events = match change {
            PlannedChange::Acquire(lot) => {
                // Callers feed ascending transaction times, so the tail is the
                // correct position.
                self.lots.push_back(lot);
                Vec::new()
            }
            PlannedChange::Dispose(plan) => {
                let mut events = Vec::with_capacity(plan.matches.len());
                for (index, matched) in plan.matches {
                    let lot = &mut self.lots[index];
                    lot.consume(matched);

                    let cost_basis = matched * (lot.unit_price + lot.unit_fee + plan.unit_fee);
                    let proceeds = matched * plan.unit_price;
                    events.push(GainEvent {
                        buy_transaction_id: lot.transaction_id,
                        sell_transaction_id: transaction.id,
                        currency: self.currency.clone(),
                        quantity: matched,
                        cost_basis,
                        proceeds,
                        gain: proceeds - cost_basis,
                        acquired_at: lot.acquired_at,
                        disposed_at: transaction.transacted_at,
                        term: Term::classify(lot.acquired_at, transaction.transacted_at),
                    });
                }
                self.prune_exhausted_front();
                events
            }
        };
        self.last_processed = transaction.transacted_at;
        events
    }

    /// Walk lots from the front until `quantity` is covered.
    fn plan_matches(
        &self,
        transaction: &Transaction,
        quantity: Decimal,
    ) -> Result<Vec<(usize, Decimal)>, LedgerError> {
        let mut to_match = quantity;
        let mut matches = Vec::new();
        for (index, lot) in self.lots.iter().enumerate() {
            if to_match.is_zero() {
                break;
            }
            let matched = lot.remaining().min(to_match);
            if matched.is_zero() {
                continue;
            }
            matches.push((index, matched));
            to_match -= matched;
        }

        if !to_match.is_zero() {
            return Err(LedgerError::InsufficientLots {
                transaction_id: transaction.id,
                currency: self.currency.clone(),
                transacted_at: transaction.transacted_at,
                requested: quantity,
                available: self.outstanding_quantity(),
            });
        }
        Ok(matches)
    }

    /// Drop fully consumed lots, front only. A partially consumed lot at the
    /// front stops pruning.
    fn prune_exhausted_front(&mut self) {
        while self.lots.front().is_some_and(Lot::is_exhausted) {
            self.lots.pop_front();
        }
    }

    /// Unit price and unit fee of the leg moving `quantity` of this currency.
    fn per_unit(
        &self,
        transaction: &Transaction,
        quantity: Decimal,
    ) -> Result<(Decimal, Decimal), LedgerError> {
        let invalid_quantity = || {
            self.validation(
                transaction,
                ValidationKind::NonPositiveQuantity {
                    currency: self.currency.clone(),
                },
            )
        };
        if !quantity.is_positive() {
            return Err(invalid_quantity());
        }
        let unit_price = transaction
            .usd_value
            .checked_div(quantity)
            .ok_or_else(invalid_quantity)?;
        let unit_fee = transaction.fee.checked_div(quantity).ok_or_else(invalid_quantity)?;
        Ok((unit_price, unit_fee))
    }

    fn validation(&self, transaction: &Transaction, kind: ValidationKind) -> LedgerError {
        LedgerError::Validation {
            transaction_id: transaction.id,
            transacted_at: transaction.transacted_at,
            kind,
        }
    }

    /// Sum of remaining quantity across open lots.
    pub fn outstanding_quantity(&self) -> Decimal {
        self.lots.iter().map(Lot::remaining).sum()
    }

    /// Remaining-quantity-weighted unit price, zero when nothing is held.
    pub fn average_cost(&self) -> Decimal {
        let outstanding = self.outstanding_quantity();
        if outstanding.is_zero() {
            return Decimal::zero();
        }
        let total_cost: Decimal = self
            .lots
            .iter()
            .map(|lot| lot.remaining() * lot.unit_price)
            .sum();
        total_cost / outstanding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Account, TransactionType, DAY_MS};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn btc() -> Currency {
        Currency::new("BTC")
    }

    fn buy(id: i64, qty: &str, usd: &str, fee: &str, time_ms: i64) -> Transaction {
        let acct = Account::named("Coinbase");
        Transaction {
            id,
            kind: TransactionType::Trade,
            external_id: None,
            from_account: acct.clone(),
            from_currency: Currency::new("USD"),
            from_amount: d(usd),
            to_account: acct,
            to_currency: btc(),
            to_amount: d(qty),
            usd_value: d(usd),
            fee: d(fee),
            transacted_at: TimeMs::new(time_ms),
        }
    }

    fn sell(id: i64, qty: &str, usd: &str, fee: &str, time_ms: i64) -> Transaction {
        let acct = Account::named("Coinbase");
        Transaction {
            id,
            kind: TransactionType::Trade,
            external_id: None,
            from_account: acct.clone(),
            from_currency: btc(),
            from_amount: d(qty),
            to_account: acct,
            to_currency: Currency::new("USD"),
            to_amount: d(usd),
            usd_value: d(usd),
            fee: d(fee),
            transacted_at: TimeMs::new(time_ms),
        }
    }

    #[test]
    fn test_acquisition_appends_lot_with_unit_values() {
        let mut wallet = VirtualWallet::new(btc(), TimeMs::new(0));
        let events = wallet.process(&buy(1, "4", "100", "2", 1000)).unwrap();
        assert!(events.is_empty());

        let lot = wallet.lots().next().unwrap();
        assert_eq!(lot.unit_price, d("25"));
        assert_eq!(lot.unit_fee, d("0.5"));
        assert_eq!(lot.remaining(), d("4"));
        assert_eq!(wallet.last_processed(), TimeMs::new(1000));
    }

    #[test]
    fn test_disposal_fees_enter_cost_basis() {
        let mut wallet = VirtualWallet::new(btc(), TimeMs::new(0));
        wallet.process(&buy(1, "2", "20", "2", 1000)).unwrap();
        let events = wallet.process(&sell(2, "2", "40", "4", 2000)).unwrap();

        assert_eq!(events.len(), 1);
        let e = &events[0];
        // 2 * (10 + 1 + 2)
        assert_eq!(e.cost_basis, d("26"));
        assert_eq!(e.proceeds, d("40"));
        assert_eq!(e.gain, d("14"));
        assert_eq!(e.buy_transaction_id, 1);
        assert_eq!(e.sell_transaction_id, 2);
        assert_eq!(wallet.lot_count(), 0);
    }

    #[test]
    fn test_partial_match_keeps_front_lot() {
        let mut wallet = VirtualWallet::new(btc(), TimeMs::new(0));
        wallet.process(&buy(1, "3", "30", "0", 1000)).unwrap();
        wallet.process(&sell(2, "1", "15", "0", 2000)).unwrap();

        assert_eq!(wallet.lot_count(), 1);
        assert_eq!(wallet.lots().next().unwrap().remaining(), d("2"));
    }

    #[test]
    fn test_same_currency_rejected() {
        let mut wallet = VirtualWallet::new(btc(), TimeMs::new(0));
        let mut t = buy(1, "1", "10", "0", 1000);
        t.from_currency = btc();
        t.to_account = Account::named("CoinbasePro");

        match wallet.process(&t) {
            Err(LedgerError::Validation { transaction_id, kind, .. }) => {
                assert_eq!(transaction_id, 1);
                assert_eq!(kind, ValidationKind::SameCurrency { currency: btc() });
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_unrelated_currency_is_scope_error() {
        let mut wallet = VirtualWallet::new(Currency::new("ETH"), TimeMs::new(0));
        match wallet.process(&buy(7, "1", "10", "0", 1000)) {
            Err(LedgerError::Scope { transaction_id, currency, .. }) => {
                assert_eq!(transaction_id, 7);
                assert_eq!(currency, Currency::new("ETH"));
            }
            other => panic!("Expected Scope error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_quantity_acquisition_rejected() {
        let mut wallet = VirtualWallet::new(btc(), TimeMs::new(0));
        let result = wallet.process(&buy(1, "0", "10", "0", 1000));
        assert!(matches!(
            result,
            Err(LedgerError::Validation {
                kind: ValidationKind::NonPositiveQuantity { .. },
                ..
            })
        ));
        assert_eq!(wallet.lot_count(), 0);
    }

    #[test]
    fn test_insufficient_lots_leaves_wallet_untouched() {
        let mut wallet = VirtualWallet::new(btc(), TimeMs::new(0));
        wallet.process(&buy(1, "1", "10", "0", 1000)).unwrap();
        wallet.process(&buy(2, "1", "20", "0", 2000)).unwrap();
        let before = wallet.clone();

        match wallet.process(&sell(3, "2.5", "50", "0", 3000)) {
            Err(LedgerError::InsufficientLots {
                transaction_id,
                requested,
                available,
                ..
            }) => {
                assert_eq!(transaction_id, 3);
                assert_eq!(requested, d("2.5"));
                assert_eq!(available, d("2"));
            }
            other => panic!("Expected InsufficientLots, got {:?}", other),
        }
        assert_eq!(wallet, before);
    }

    #[test]
    fn test_long_term_at_exactly_365_days() {
        let mut wallet = VirtualWallet::new(btc(), TimeMs::new(0));
        wallet.process(&buy(1, "1", "10", "0", 0)).unwrap();
        wallet.process(&buy(2, "1", "10", "0", DAY_MS)).unwrap();
        let events = wallet
            .process(&sell(3, "2", "40", "0", 365 * DAY_MS))
            .unwrap();

        assert_eq!(events[0].term, Term::LongTerm);
        assert_eq!(events[1].term, Term::ShortTerm);
    }

    #[test]
    fn test_average_cost_weighted_by_remaining() {
        let mut wallet = VirtualWallet::new(btc(), TimeMs::new(0));
        assert_eq!(wallet.average_cost(), Decimal::zero());

        wallet.process(&buy(1, "1", "10", "0", 1000)).unwrap();
        wallet.process(&buy(2, "3", "90", "0", 2000)).unwrap();
        // (1*10 + 3*30) / 4
        assert_eq!(wallet.average_cost(), d("25"));

        wallet.process(&sell(3, "1", "40", "0", 3000)).unwrap();
        assert_eq!(wallet.average_cost(), d("30"));
        assert_eq!(wallet.outstanding_quantity(), d("3"));
    }
}
