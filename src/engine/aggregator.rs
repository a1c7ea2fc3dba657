use crate::domain::{Currency, Decimal, TimeMs};
use serde::{Deserialize, Serialize};

use super::{GainEvent, Term};

/// Inclusive range of observed timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub earliest: TimeMs,
    pub latest: TimeMs,
}

impl TimeRange {
    fn point(t: TimeMs) -> Self {
        Self {
            earliest: t,
            latest: t,
        }
    }

    fn widen(range: Option<TimeRange>, t: TimeMs) -> Option<TimeRange> {
        Some(match range {
            None => TimeRange::point(t),
            Some(r) => TimeRange {
                earliest: r.earliest.min(t),
                latest: r.latest.max(t),
            },
        })
    }
}

/// Running totals for one holding-period term.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TermBucket {
    pub gain: Decimal,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub proceeds: Decimal,
    /// None until the first event lands in this bucket.
    pub acquired_range: Option<TimeRange>,
    pub disposed_range: Option<TimeRange>,
    pub event_count: usize,
}

impl TermBucket {
    fn add(&mut self, event: &GainEvent) {
        self.gain += event.gain;
        self.quantity += event.quantity;
        self.cost_basis += event.cost_basis;
        self.proceeds += event.proceeds;
        self.acquired_range = TimeRange::widen(self.acquired_range, event.acquired_at);
        self.disposed_range = TimeRange::widen(self.disposed_range, event.disposed_at);
        self.event_count += 1;
    }
}

/// Short-term and long-term totals for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainAggregator {
    pub currency: Currency,
    pub short_term: TermBucket,
    pub long_term: TermBucket,
}

impl GainAggregator {
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            short_term: TermBucket::default(),
            long_term: TermBucket::default(),
        }
    }

    pub fn accumulate(&mut self, event: &GainEvent) {
        debug_assert_eq!(event.currency, self.currency);
        match event.term {
            Term::ShortTerm => self.short_term.add(event),
            Term::LongTerm => self.long_term.add(event),
        }
    }

    pub fn bucket(&self, term: Term) -> &TermBucket {
        match term {
            Term::ShortTerm => &self.short_term,
            Term::LongTerm => &self.long_term,
        }
    }
}
