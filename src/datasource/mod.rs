//! Transaction source abstraction with explicit, resumable page cursors.

use crate::domain::{Account, Scope, TimeMs, Transaction, TransactionOrderingKey};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;

pub mod csv_import;
pub mod mock;

pub use csv_import::{parse_transactions_csv, CsvImportError};
pub use mock::MockTransactionSource;

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: TimeMs,
    pub end: TimeMs,
}

impl TimeWindow {
    pub fn new(start: TimeMs, end: TimeMs) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: TimeMs) -> bool {
        t >= self.start && t < self.end
    }
}

/// Position after the last transaction of a page.
///
/// Serializes to an opaque token so callers can persist and resume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub after: TransactionOrderingKey,
}

impl PageCursor {
    pub fn after(transaction: &Transaction) -> Self {
        Self {
            after: TransactionOrderingKey::from_transaction(transaction),
        }
    }

    pub fn to_token(&self) -> String {
        format!("{}:{}", self.after.transacted_at.as_ms(), self.after.id)
    }

    pub fn from_token(token: &str) -> Result<Self, SourceError> {
        let invalid = || SourceError::InvalidCursor(token.to_string());
        let (ms, id) = token.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            after: TransactionOrderingKey {
                transacted_at: TimeMs::new(ms.parse().map_err(|_| invalid())?),
                id: id.parse().map_err(|_| invalid())?,
            },
        })
    }
}

/// One page of transactions plus the cursor of the next page, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub next: Option<PageCursor>,
}

/// Which transactions belong to a portfolio scope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScopeFilter {
    #[default]
    All,
    /// Both legs on this account.
    OnlyAccount(Account),
    /// Neither leg on this account.
    ExcludeAccount(Account),
}

impl ScopeFilter {
    pub fn matches(&self, transaction: &Transaction) -> bool {
        match self {
            ScopeFilter::All => true,
            ScopeFilter::OnlyAccount(a) => {
                &transaction.from_account == a && &transaction.to_account == a
            }
            ScopeFilter::ExcludeAccount(a) => {
                &transaction.from_account != a && &transaction.to_account != a
            }
        }
    }
}

/// Source of transactions for a scope.
///
/// Pages are ordered ascending by `(transacted_at, id)` and contain only
/// transactions inside the window.
#[async_trait]
pub trait TransactionSource: Send + Sync + fmt::Debug {
    /// Fetch up to `limit` transactions strictly after `cursor` (or from the
    /// window start when `cursor` is None).
    async fn fetch_page(
        &self,
        scope: &Scope,
        window: TimeWindow,
        cursor: Option<PageCursor>,
        limit: usize,
    ) -> Result<TransactionPage, SourceError>;
}

/// Error type for transaction source operations.
#[derive(Debug, Clone)]
pub enum SourceError {
    /// Underlying store failed.
    Database(String),
    /// Stored row could not be decoded.
    InvalidRow { id: i64, reason: String },
    /// Cursor token was malformed.
    InvalidCursor(String),
    /// Scope has no configured filter.
    UnknownScope(Scope),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Database(msg) => write!(f, "Database error: {}", msg),
            SourceError::InvalidRow { id, reason } => {
                write!(f, "Invalid transaction row {}: {}", id, reason)
            }
            SourceError::InvalidCursor(token) => write!(f, "Invalid page cursor: {}", token),
            SourceError::UnknownScope(scope) => write!(f, "Unrecognized scope: {}", scope),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<sqlx::Error> for SourceError {
    fn from(err: sqlx::Error) -> Self {
        SourceError::Database(err.to_string())
    }
}

/// Forward iteration over a source, holding at most one page in memory.
pub struct TransactionStream<'a> {
    source: &'a dyn TransactionSource,
    scope: Scope,
    window: TimeWindow,
    page_size: usize,
    buffer: VecDeque<Transaction>,
    cursor: Option<PageCursor>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<'a> TransactionStream<'a> {
    pub fn new(
        source: &'a dyn TransactionSource,
        scope: Scope,
        window: TimeWindow,
        page_size: usize,
    ) -> Self {
        Self {
            source,
            scope,
            window,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
            pages_fetched: 0,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub async fn next(&mut self) -> Result<Option<Transaction>, SourceError> {
        loop {
            if let Some(transaction) = self.buffer.pop_front() {
                return Ok(Some(transaction));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self
                .source
                .fetch_page(&self.scope, self.window, self.cursor, self.page_size)
                .await?;
            self.pages_fetched += 1;

            match page.next {
                // An empty page cannot advance the cursor.
                Some(next) if !page.transactions.is_empty() => self.cursor = Some(next),
                _ => self.exhausted = true,
            }
            self.buffer.extend(page.transactions);
        }
    }
}
