//! Capital gains report assembled from per-currency aggregators.

use crate::db::SnapshotInfo;
use crate::domain::{Currency, Decimal, Scope, TimeMs};
use crate::engine::{GainAggregator, Term, TimeRange};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::valuation::UnrealizedReport;

/// Totals for one currency within one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyTermSummary {
    pub currency: Currency,
    pub total_quantity: Decimal,
    pub total_cost_basis: Decimal,
    pub total_proceeds: Decimal,
    pub gain: Decimal,
    pub acquired_range: Option<TimeRange>,
    pub disposed_range: Option<TimeRange>,
    pub event_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermReport {
    pub gain: Decimal,
    /// One entry per currency with at least one event in this term,
    /// ordered by currency.
    pub details: Vec<CurrencyTermSummary>,
}

impl TermReport {
    pub fn from_aggregators(aggregators: &BTreeMap<Currency, GainAggregator>, term: Term) -> Self {
        let details: Vec<CurrencyTermSummary> = aggregators
            .values()
            .map(|agg| (agg, agg.bucket(term)))
            .filter(|(_, bucket)| bucket.event_count > 0)
            .map(|(agg, bucket)| CurrencyTermSummary {
                currency: agg.currency.clone(),
                total_quantity: bucket.quantity,
                total_cost_basis: bucket.cost_basis,
                total_proceeds: bucket.proceeds,
                gain: bucket.gain,
                acquired_range: bucket.acquired_range,
                disposed_range: bucket.disposed_range,
                event_count: bucket.event_count,
            })
            .collect();

        Self {
            gain: details.iter().map(|d| d.gain).sum(),
            details,
        }
    }
}

/// Unrealized section; degrades instead of failing the run when pricing fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnrealizedSection {
    Available(UnrealizedReport),
    #[serde(rename_all = "camelCase")]
    Unavailable {
        currency: Currency,
        at: TimeMs,
        reason: String,
    },
}

impl UnrealizedSection {
    pub fn is_available(&self) -> bool {
        matches!(self, UnrealizedSection::Available(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapGainsReport {
    pub scope: Scope,
    pub run_id: Uuid,
    pub start: TimeMs,
    pub end: TimeMs,
    pub short_term: TermReport,
    pub long_term: TermReport,
    pub unrealized: UnrealizedSection,
    pub transactions_processed: usize,
    /// Snapshot persisted at `end`.
    pub snapshot: SnapshotInfo,
}
