//! Transaction ledger operations for the repository.

use crate::datasource::{
    PageCursor, ScopeFilter, SourceError, TimeWindow, TransactionPage, TransactionSource,
};
use crate::domain::{
    Account, Currency, Decimal, NewTransaction, Scope, TimeMs, Transaction,
    TransactionOrderingKey, TransactionType,
};
use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{QueryBuilder, Row};
use tracing::debug;

use super::Repository;

const INSERT_TRANSACTION: &str = r#"
    INSERT INTO transactions (
        kind, external_id, from_account, from_currency, from_amount,
        to_account, to_currency, to_amount, usd_value, fee,
        transacted_at_ms, created_at_ms
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(external_id) DO NOTHING
"#;

impl Repository {
    /// Insert a transaction. Returns the assigned id, or None when a row with
    /// the same `external_id` already exists.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<Option<i64>, sqlx::Error> {
        let created_at = chrono::Utc::now().timestamp_millis();
        let result = bind_transaction(sqlx::query(INSERT_TRANSACTION), transaction, created_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            Ok(Some(result.last_insert_rowid()))
        } else {
            Ok(None)
        }
    }

    /// Insert multiple transactions in a single database transaction.
    ///
    /// Returns the number of newly inserted rows (excludes duplicates).
    ///
    /// # Errors
    /// Returns an error if the transaction fails; nothing is inserted then.
    pub async fn insert_transactions_batch(
        &self,
        transactions: &[NewTransaction],
    ) -> Result<usize, sqlx::Error> {
        if transactions.is_empty() {
            return Ok(0);
        }

        let created_at = chrono::Utc::now().timestamp_millis();
        let mut total_inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for transaction in transactions {
            let result =
                bind_transaction(sqlx::query(INSERT_TRANSACTION), transaction, created_at)
                    .execute(&mut *tx)
                    .await?;
            if result.rows_affected() > 0 {
                total_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    /// Read up to `limit` transactions of the window strictly after `after`,
    /// ascending by `(transacted_at, id)`.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn query_transactions_page(
        &self,
        filter: &ScopeFilter,
        window: TimeWindow,
        after: Option<TransactionOrderingKey>,
        limit: usize,
    ) -> Result<Vec<Transaction>, SourceError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT id, kind, external_id, from_account, from_currency, from_amount,
                   to_account, to_currency, to_amount, usd_value, fee, transacted_at_ms
            FROM transactions
            WHERE transacted_at_ms >= "#,
        );
        query.push_bind(window.start.as_ms());
        query.push(" AND transacted_at_ms < ");
        query.push_bind(window.end.as_ms());

        if let Some(key) = after {
            query.push(" AND (transacted_at_ms > ");
            query.push_bind(key.transacted_at.as_ms());
            query.push(" OR (transacted_at_ms = ");
            query.push_bind(key.transacted_at.as_ms());
            query.push(" AND id > ");
            query.push_bind(key.id);
            query.push("))");
        }

        match filter {
            ScopeFilter::All => {}
            ScopeFilter::OnlyAccount(account) => {
                query.push(" AND from_account = ");
                query.push_bind(account.as_str().to_string());
                query.push(" AND to_account = ");
                query.push_bind(account.as_str().to_string());
            }
            ScopeFilter::ExcludeAccount(account) => {
                query.push(" AND from_account != ");
                query.push_bind(account.as_str().to_string());
                query.push(" AND to_account != ");
                query.push_bind(account.as_str().to_string());
            }
        }

        query.push(" ORDER BY transacted_at_ms ASC, id ASC LIMIT ");
        query.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(transaction_from_row).collect()
    }
}

#[async_trait]
impl TransactionSource for Repository {
    async fn fetch_page(
        &self,
        scope: &Scope,
        window: TimeWindow,
        cursor: Option<PageCursor>,
        limit: usize,
    ) -> Result<TransactionPage, SourceError> {
        let filter = self
            .scope_filter(scope)
            .ok_or_else(|| SourceError::UnknownScope(scope.clone()))?;

        // One extra row tells us whether another page exists.
        let mut transactions = self
            .query_transactions_page(
                filter,
                window,
                cursor.map(|c| c.after),
                limit.saturating_add(1),
            )
            .await?;
        let next = if transactions.len() > limit {
            transactions.truncate(limit);
            transactions.last().map(PageCursor::after)
        } else {
            None
        };

        debug!(
            scope = %scope,
            count = transactions.len(),
            has_more = next.is_some(),
            "Fetched transaction page"
        );
        Ok(TransactionPage { transactions, next })
    }
}

fn bind_transaction<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    transaction: &'q NewTransaction,
    created_at: i64,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(transaction.kind.as_str())
        .bind(transaction.external_id.as_deref())
        .bind(transaction.from_account.as_str())
        .bind(transaction.from_currency.as_str())
        .bind(transaction.from_amount.to_canonical_string())
        .bind(transaction.to_account.as_str())
        .bind(transaction.to_currency.as_str())
        .bind(transaction.to_amount.to_canonical_string())
        .bind(transaction.usd_value.to_canonical_string())
        .bind(transaction.fee.to_canonical_string())
        .bind(transaction.transacted_at.as_ms())
        .bind(created_at)
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, SourceError> {
    let id: i64 = row.try_get("id")?;
    let invalid = |reason: String| SourceError::InvalidRow { id, reason };

    let decimal = |column: &str| -> Result<Decimal, SourceError> {
        let text: String = row.try_get(column)?;
        Decimal::from_str_canonical(&text)
            .map_err(|e| invalid(format!("{} {:?}: {}", column, text, e)))
    };

    let kind: String = row.try_get("kind")?;
    let kind = kind.parse::<TransactionType>().map_err(invalid)?;

    Ok(Transaction {
        id,
        kind,
        external_id: row.try_get("external_id")?,
        from_account: Account::named(row.try_get::<String, _>("from_account")?),
        from_currency: Currency::new(row.try_get::<String, _>("from_currency")?),
        from_amount: decimal("from_amount")?,
        to_account: Account::named(row.try_get::<String, _>("to_account")?),
        to_currency: Currency::new(row.try_get::<String, _>("to_currency")?),
        to_amount: decimal("to_amount")?,
        usd_value: decimal("usd_value")?,
        fee: decimal("fee")?,
        transacted_at: TimeMs::new(row.try_get("transacted_at_ms")?),
    })
}
