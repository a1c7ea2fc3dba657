//! In-memory transaction source for testing without a database.

use super::{PageCursor, SourceError, TimeWindow, TransactionPage, TransactionSource};
use crate::domain::{sort_transactions_deterministic, Scope, Transaction, TransactionOrderingKey};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock transaction source that pages over predefined transactions.
#[derive(Debug, Clone)]
pub struct MockTransactionSource {
    transactions: Vec<(Scope, Transaction)>,
    respect_window_start: bool,
    respect_window_end: bool,
    fetches: Arc<AtomicUsize>,
}

impl MockTransactionSource {
    pub fn new() -> Self {
        Self {
            transactions: Vec::new(),
            respect_window_start: true,
            respect_window_end: true,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add a transaction to a scope.
    pub fn with_transaction(mut self, scope: &Scope, transaction: Transaction) -> Self {
        self.transactions.push((scope.clone(), transaction));
        self
    }

    /// Add multiple transactions to a scope.
    pub fn with_transactions(mut self, scope: &Scope, transactions: Vec<Transaction>) -> Self {
        self.transactions
            .extend(transactions.into_iter().map(|t| (scope.clone(), t)));
        self
    }

    /// Also return transactions at or after the window end, as a sloppy
    /// upstream query would.
    pub fn ignoring_window_end(mut self) -> Self {
        self.respect_window_end = false;
        self
    }

    /// Also return transactions before the window start.
    pub fn ignoring_window_start(mut self) -> Self {
        self.respect_window_start = false;
        self
    }

    /// Number of `fetch_page` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Default for MockTransactionSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionSource for MockTransactionSource {
    async fn fetch_page(
        &self,
        scope: &Scope,
        window: TimeWindow,
        cursor: Option<PageCursor>,
        limit: usize,
    ) -> Result<TransactionPage, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let mut matching: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|(s, t)| {
                s == scope
                    && (!self.respect_window_start || t.transacted_at >= window.start)
                    && (!self.respect_window_end || t.transacted_at < window.end)
            })
            .map(|(_, t)| t.clone())
            .collect();
        sort_transactions_deterministic(&mut matching);

        let remaining: Vec<Transaction> = matching
            .into_iter()
            .filter(|t| match cursor {
                Some(c) => TransactionOrderingKey::from_transaction(t) > c.after,
                None => true,
            })
            .collect();

        let has_more = remaining.len() > limit;
        let transactions: Vec<Transaction> = remaining.into_iter().take(limit).collect();
        let next = if has_more {
            transactions.last().map(PageCursor::after)
        } else {
            None
        };

        Ok(TransactionPage { transactions, next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::TransactionStream;
    use crate::domain::{Account, Currency, Decimal, TimeMs, TransactionType};

    fn deposit(id: i64, time_ms: i64) -> Transaction {
        Transaction {
            id,
            kind: TransactionType::Transfer,
            external_id: None,
            from_account: Account::External,
            from_currency: Currency::new("BTC"),
            from_amount: Decimal::from(1),
            to_account: Account::named("Coinbase"),
            to_currency: Currency::new("BTC"),
            to_amount: Decimal::from(1),
            usd_value: Decimal::from(100),
            fee: Decimal::zero(),
            transacted_at: TimeMs::new(time_ms),
        }
    }

    #[tokio::test]
    async fn test_mock_pages_in_order() {
        let scope = Scope::new("personal");
        let source = MockTransactionSource::new().with_transactions(
            &scope,
            vec![deposit(3, 300), deposit(1, 100), deposit(2, 200)],
        );
        let window = TimeWindow::new(TimeMs::new(0), TimeMs::new(1000));

        let first = source.fetch_page(&scope, window, None, 2).await.unwrap();
        assert_eq!(
            first.transactions.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(first.next.is_some());

        let second = source
            .fetch_page(&scope, window, first.next, 2)
            .await
            .unwrap();
        assert_eq!(second.transactions.len(), 1);
        assert_eq!(second.transactions[0].id, 3);
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn test_mock_respects_scope_and_window() {
        let personal = Scope::new("personal");
        let business = Scope::new("business");
        let source = MockTransactionSource::new()
            .with_transaction(&personal, deposit(1, 100))
            .with_transaction(&personal, deposit(2, 1000))
            .with_transaction(&business, deposit(3, 100));
        let window = TimeWindow::new(TimeMs::new(0), TimeMs::new(1000));

        let page = source.fetch_page(&personal, window, None, 10).await.unwrap();
        assert_eq!(page.transactions.len(), 1);
        assert_eq!(page.transactions[0].id, 1);
    }

    #[tokio::test]
    async fn test_stream_reads_incrementally() {
        let scope = Scope::new("personal");
        let source = MockTransactionSource::new().with_transactions(
            &scope,
            (1..=5).map(|i| deposit(i, i * 100)).collect(),
        );
        let window = TimeWindow::new(TimeMs::new(0), TimeMs::new(10_000));
        let mut stream = TransactionStream::new(&source, scope, window, 2);

        let mut ids = Vec::new();
        while let Some(t) = stream.next().await.unwrap() {
            ids.push(t.id);
        }
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(stream.pages_fetched(), 3);
        assert_eq!(source.fetch_count(), 3);
    }
}
