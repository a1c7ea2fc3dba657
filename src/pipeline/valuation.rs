//! Mark-to-market of a portfolio's open lots.

use crate::domain::{Currency, Decimal, TimeMs};
use crate::engine::Portfolio;
use crate::pricing::{PriceError, PriceOracle};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Unrealized position in one currency at the mark time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletValuation {
    pub currency: Currency,
    pub last_transacted_at: TimeMs,
    pub mark_time: TimeMs,
    /// Zero when nothing is held, since no price is fetched then.
    pub market_price: Decimal,
    pub outstanding_quantity: Decimal,
    pub average_cost: Decimal,
    pub unrealized_gain: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnrealizedReport {
    pub wallets: Vec<WalletValuation>,
    pub total_unrealized_gain: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to price {currency} at {at}: {source}")]
pub struct MarkError {
    pub currency: Currency,
    pub at: TimeMs,
    #[source]
    pub source: PriceError,
}

/// Value every wallet at `at`.
///
/// The oracle is only asked about currencies with a positive outstanding
/// quantity, one at a time in wallet order. The first pricing failure
/// aborts the mark.
pub async fn mark(
    portfolio: &Portfolio,
    oracle: &dyn PriceOracle,
    at: TimeMs,
) -> Result<UnrealizedReport, MarkError> {
    let mut wallets = Vec::new();
    let mut total_unrealized_gain = Decimal::zero();

    for holding in portfolio.holdings() {
        let (market_price, unrealized_gain) = if holding.outstanding_quantity.is_positive() {
            let price = oracle
                .get_price(&holding.currency, at)
                .await
                .map_err(|source| MarkError {
                    currency: holding.currency.clone(),
                    at,
                    source,
                })?;
            let gain = holding.outstanding_quantity * (price - holding.average_cost);
            (price, gain)
        } else {
            (Decimal::zero(), Decimal::zero())
        };

        debug!(
            currency = %holding.currency,
            outstanding = %holding.outstanding_quantity,
            market_price = %market_price,
            "Marked wallet"
        );

        total_unrealized_gain += unrealized_gain;
        wallets.push(WalletValuation {
            currency: holding.currency,
            last_transacted_at: holding.last_transacted_at,
            mark_time: at,
            market_price,
            outstanding_quantity: holding.outstanding_quantity,
            average_cost: holding.average_cost,
            unrealized_gain,
        });
    }

    Ok(UnrealizedReport {
        wallets,
        total_unrealized_gain,
    })
}
