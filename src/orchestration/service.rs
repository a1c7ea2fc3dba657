use crate::db::{SnapshotError, SnapshotInfo, SnapshotStore};
use crate::domain::{Currency, Scope, TimeMs};
use crate::engine::Portfolio;
use crate::pipeline::{CapGainsReport, ReportError, ReportingPipeline};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// 2010-01-01T00:00:00Z, before any tracked activity.
pub const DEFAULT_GENESIS_MS: i64 = 1_262_304_000_000;

/// Runs reports, serializing runs that share a scope.
#[derive(Debug)]
pub struct ReportService {
    pipeline: ReportingPipeline,
    valuation_currency: Currency,
    scope_locks: Mutex<HashMap<Scope, Arc<Mutex<()>>>>,
}

impl ReportService {
    pub fn new(pipeline: ReportingPipeline, valuation_currency: Currency) -> Self {
        Self {
            pipeline,
            valuation_currency,
            scope_locks: Mutex::new(HashMap::new()),
        }
    }

    fn snapshots(&self) -> &dyn SnapshotStore {
        self.pipeline.snapshots().as_ref()
    }

    async fn scope_lock(&self, scope: &Scope) -> Arc<Mutex<()>> {
        let mut locks = self.scope_locks.lock().await;
        locks.entry(scope.clone()).or_default().clone()
    }

    /// Store an empty starting portfolio at `at` unless the scope already
    /// has a snapshot. Returns the created snapshot, if any.
    pub async fn ensure_genesis(
        &self,
        scope: &Scope,
        at: TimeMs,
    ) -> Result<Option<SnapshotInfo>, ReportError> {
        let lock = self.scope_lock(scope).await;
        let _guard = lock.lock().await;

        if !self.snapshots().list(scope).await?.is_empty() {
            return Ok(None);
        }

        let genesis = Portfolio::new(scope.clone(), at, self.valuation_currency.clone());
        let info = self.snapshots().save(&genesis).await?;
        info!(scope = %scope, as_of = %at, "Created genesis snapshot");
        Ok(Some(info))
    }

    /// Report `[start, end)` for a scope from the snapshot stored at `start`.
    ///
    /// # Errors
    /// `InvalidWindow` unless `start < end`; `Snapshot(NotFound)` when no
    /// snapshot exists at exactly `start`; otherwise whatever the pipeline
    /// raises.
    pub async fn run_report(
        &self,
        scope: &Scope,
        start: TimeMs,
        end: TimeMs,
    ) -> Result<CapGainsReport, ReportError> {
        if start >= end {
            return Err(ReportError::InvalidWindow { start, end });
        }

        let lock = self.scope_lock(scope).await;
        let _guard = lock.lock().await;

        let portfolio = self.snapshots().load(scope, start).await?;
        self.pipeline.run(portfolio, end).await
    }

    pub async fn list_snapshots(&self, scope: &Scope) -> Result<Vec<SnapshotInfo>, SnapshotError> {
        self.snapshots().list(scope).await
    }
}
