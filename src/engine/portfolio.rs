use crate::domain::{Currency, Decimal, Scope, TimeMs, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::wallet::PlannedChange;
use super::{GainEvent, LedgerError, VirtualWallet};

/// Point-in-time lot state of every currency held within one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    scope: Scope,
    as_of: TimeMs,
    valuation_currency: Currency,
    wallets: BTreeMap<Currency, VirtualWallet>,
}

/// Outstanding position in one currency, before marking to market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub currency: Currency,
    pub last_transacted_at: TimeMs,
    pub outstanding_quantity: Decimal,
    pub average_cost: Decimal,
}

impl Portfolio {
    /// Create an empty portfolio.
    pub fn new(scope: Scope, as_of: TimeMs, valuation_currency: Currency) -> Self {
        Self {
            scope,
            as_of,
            valuation_currency,
            wallets: BTreeMap::new(),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn as_of(&self) -> TimeMs {
        self.as_of
    }

    pub fn valuation_currency(&self) -> &Currency {
        &self.valuation_currency
    }

    /// Force the as-of boundary, e.g. to the end of a reporting window.
    pub fn set_as_of(&mut self, as_of: TimeMs) {
        self.as_of = as_of;
    }

    pub fn wallet(&self, currency: &Currency) -> Option<&VirtualWallet> {
        self.wallets.get(currency)
    }

    pub fn wallets(&self) -> impl Iterator<Item = &VirtualWallet> {
        self.wallets.values()
    }

    /// Currencies this transaction moves, excluding the valuation currency.
    ///
    /// The disposed leg comes first so that the order of emitted events is
    /// stable across runs.
    pub fn relevant_currencies(&self, transaction: &Transaction) -> Vec<Currency> {
        let mut currencies = Vec::with_capacity(2);
        for currency in [&transaction.from_currency, &transaction.to_currency] {
            if currency != &self.valuation_currency && !currencies.contains(currency) {
                currencies.push(currency.clone());
            }
        }
        currencies
    }

    /// Route a transaction to every relevant wallet.
    ///
    /// Every leg is planned before any is applied, so a failure in one leg
    /// leaves the whole portfolio unchanged. Wallets are created on first use,
    /// seeded with the transaction time.
    pub fn process(&mut self, transaction: &Transaction) -> Result<Vec<GainEvent>, LedgerError> {
        let mut staged: Vec<(Currency, Option<VirtualWallet>, PlannedChange)> = Vec::new();
        for currency in self.relevant_currencies(transaction) {
            match self.wallets.get(&currency) {
                Some(wallet) => {
                    let change = wallet.plan(transaction)?;
                    staged.push((currency, None, change));
                }
                None => {
                    let wallet = VirtualWallet::new(currency.clone(), transaction.transacted_at);
                    let change = wallet.plan(transaction)?;
                    staged.push((currency, Some(wallet), change));
                }
            }
        }

        let mut events = Vec::new();
        for (currency, created, change) in staged {
            let wallet = match created {
                Some(wallet) => self.wallets.entry(currency).or_insert(wallet),
                None => match self.wallets.get_mut(&currency) {
                    Some(wallet) => wallet,
                    None => continue,
                },
            };
            events.extend(wallet.commit(transaction, change));
        }

        self.as_of = transaction.transacted_at;
        Ok(events)
    }

    /// Outstanding quantity and average cost per currency.
    pub fn holdings(&self) -> Vec<Holding> {
        self.wallets
            .values()
            .map(|wallet| Holding {
                currency: wallet.currency().clone(),
                last_transacted_at: wallet.last_processed(),
                outstanding_quantity: wallet.outstanding_quantity(),
                average_cost: wallet.average_cost(),
            })
            .collect()
    }
}
