//! Repository layer for database operations.
//!
//! Methods are organized across submodules by table:
//! - `transactions.rs` - ingestion and keyset-paged reads of the ledger
//! - `snapshots.rs` - `SnapshotStore` over `portfolio_snapshots`

mod snapshots;
mod transactions;

use crate::datasource::ScopeFilter;
use crate::domain::Scope;
use sqlx::sqlite::SqlitePool;
use std::collections::HashMap;

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    scope_filters: HashMap<Scope, ScopeFilter>,
}

impl Repository {
    /// Create a new repository with the given connection pool and no scopes.
    pub fn new(pool: SqlitePool) -> Self {
        Repository {
            pool,
            scope_filters: HashMap::new(),
        }
    }

    /// Set the account filter applied to each scope's transaction reads.
    pub fn with_scope_filters(mut self, scope_filters: HashMap<Scope, ScopeFilter>) -> Self {
        self.scope_filters = scope_filters;
        self
    }

    pub fn scope_filter(&self, scope: &Scope) -> Option<&ScopeFilter> {
        self.scope_filters.get(scope)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
