//! Reporting pipeline: replays a window of transactions onto a starting
//! portfolio, persists the resulting snapshot and reports realized and
//! unrealized gains.
//!
//! A run either completes and persists exactly one snapshot at `end`, or
//! fails before anything is written.

use crate::datasource::{SourceError, TimeWindow, TransactionSource, TransactionStream};
use crate::db::{SnapshotError, SnapshotStore};
use crate::domain::{Currency, TimeMs};
use crate::engine::{GainAggregator, LedgerError, Portfolio, Term, ValidationKind};
use crate::pricing::PriceOracle;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub mod report;
pub mod valuation;

pub use report::{CapGainsReport, CurrencyTermSummary, TermReport, UnrealizedSection};
pub use valuation::{mark, MarkError, UnrealizedReport, WalletValuation};

/// Default number of transactions fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Largest page the pipeline will request.
pub const MAX_PAGE_SIZE: usize = 10_000;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid report window: start {start} must be before end {end}")]
    InvalidWindow { start: TimeMs, end: TimeMs },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Debug, Clone)]
pub struct ReportingPipeline {
    source: Arc<dyn TransactionSource>,
    oracle: Arc<dyn PriceOracle>,
    snapshots: Arc<dyn SnapshotStore>,
    page_size: usize,
}

impl ReportingPipeline {
    pub fn new(
        source: Arc<dyn TransactionSource>,
        oracle: Arc<dyn PriceOracle>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            source,
            oracle,
            snapshots,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn snapshots(&self) -> &Arc<dyn SnapshotStore> {
        &self.snapshots
    }

    /// Process `[portfolio.as_of(), end)` and report.
    ///
    /// # Errors
    /// Any ledger, source or persistence error aborts the run with no
    /// snapshot written. A pricing failure only degrades the unrealized
    /// section.
    pub async fn run(
        &self,
        portfolio: Portfolio,
        end: TimeMs,
    ) -> Result<CapGainsReport, ReportError> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "report_run",
            run_id = %run_id,
            scope = %portfolio.scope(),
        );
        self.run_inner(run_id, portfolio, end).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        mut portfolio: Portfolio,
        end: TimeMs,
    ) -> Result<CapGainsReport, ReportError> {
        let start = portfolio.as_of();
        if start >= end {
            return Err(ReportError::InvalidWindow { start, end });
        }
        let scope = portfolio.scope().clone();
        info!(start = %start, end = %end, "Starting report run");

        let mut stream = TransactionStream::new(
            self.source.as_ref(),
            scope.clone(),
            TimeWindow::new(start, end),
            self.page_size,
        );
        let mut aggregators: BTreeMap<Currency, GainAggregator> = BTreeMap::new();
        let mut transactions_processed = 0usize;

        while let Some(transaction) = stream.next().await? {
            if transaction.transacted_at >= end {
                break;
            }
            if transaction.transacted_at < portfolio.as_of() {
                return Err(LedgerError::Validation {
                    transaction_id: transaction.id,
                    transacted_at: transaction.transacted_at,
                    kind: ValidationKind::OutOfOrder {
                        as_of: portfolio.as_of(),
                    },
                }
                .into());
            }

            let events = portfolio.process(&transaction).map_err(|e| {
                warn!(
                    transaction_id = e.transaction_id(),
                    error = %e,
                    "Aborting report run"
                );
                e
            })?;
            for event in &events {
                aggregators
                    .entry(event.currency.clone())
                    .or_insert_with(|| GainAggregator::new(event.currency.clone()))
                    .accumulate(event);
            }
            transactions_processed += 1;
        }

        portfolio.set_as_of(end);
        let snapshot = self.snapshots.save(&portfolio).await?;
        info!(
            transactions = transactions_processed,
            pages = stream.pages_fetched(),
            digest = %snapshot.digest,
            "Persisted snapshot"
        );

        let unrealized = match mark(&portfolio, self.oracle.as_ref(), end).await {
            Ok(report) => UnrealizedSection::Available(report),
            Err(err) => {
                warn!(currency = %err.currency, error = %err.source, "Unrealized gains unavailable");
                UnrealizedSection::Unavailable {
                    currency: err.currency,
                    at: err.at,
                    reason: err.source.to_string(),
                }
            }
        };

        Ok(CapGainsReport {
            scope,
            run_id,
            start,
            end,
            short_term: TermReport::from_aggregators(&aggregators, Term::ShortTerm),
            long_term: TermReport::from_aggregators(&aggregators, Term::LongTerm),
            unrealized,
            transactions_processed,
            snapshot,
        })
    }
}
