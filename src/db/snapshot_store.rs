//! Portfolio snapshot persistence keyed by (scope, as-of time).

use crate::domain::{Scope, TimeMs};
use crate::engine::snapshot::{decode, encode};
use crate::engine::{EncodedSnapshot, Portfolio, SnapshotCodecError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no snapshot for scope {scope} at {as_of}")]
    NotFound { scope: Scope, as_of: TimeMs },
    #[error("snapshot persistence failed: {0}")]
    Persistence(String),
    #[error(transparent)]
    Codec(#[from] SnapshotCodecError),
}

impl From<sqlx::Error> for SnapshotError {
    fn from(err: sqlx::Error) -> Self {
        SnapshotError::Persistence(err.to_string())
    }
}

/// Metadata of one stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub scope: Scope,
    pub as_of_ms: i64,
    pub version: u32,
    pub digest: String,
}

impl SnapshotInfo {
    fn new(scope: Scope, as_of: TimeMs, encoded: &EncodedSnapshot) -> Self {
        Self {
            scope,
            as_of_ms: as_of.as_ms(),
            version: encoded.version,
            digest: encoded.digest.clone(),
        }
    }
}

#[async_trait]
pub trait SnapshotStore: Send + Sync + fmt::Debug {
    /// Load the portfolio stored for exactly `(scope, as_of)`.
    async fn load(&self, scope: &Scope, as_of: TimeMs) -> Result<Portfolio, SnapshotError>;

    /// Store `portfolio` under `(portfolio.scope(), portfolio.as_of())`,
    /// replacing any existing entry.
    async fn save(&self, portfolio: &Portfolio) -> Result<SnapshotInfo, SnapshotError>;

    /// Stored snapshots for a scope, ascending by as-of time.
    async fn list(&self, scope: &Scope) -> Result<Vec<SnapshotInfo>, SnapshotError>;
}

/// Snapshot store held in process memory. Goes through the same codec as
/// the SQLite store.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<BTreeMap<(Scope, TimeMs), EncodedSnapshot>>,
    fail_saves: bool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `save` fail with `SnapshotError::Persistence`.
    pub fn with_failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    /// Raw encoded snapshot, if stored.
    pub async fn encoded(&self, scope: &Scope, as_of: TimeMs) -> Option<EncodedSnapshot> {
        self.snapshots
            .read()
            .await
            .get(&(scope.clone(), as_of))
            .cloned()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self, scope: &Scope, as_of: TimeMs) -> Result<Portfolio, SnapshotError> {
        let guard = self.snapshots.read().await;
        let encoded = guard
            .get(&(scope.clone(), as_of))
            .ok_or_else(|| SnapshotError::NotFound {
                scope: scope.clone(),
                as_of,
            })?;
        Ok(decode(encoded)?)
    }

    async fn save(&self, portfolio: &Portfolio) -> Result<SnapshotInfo, SnapshotError> {
        if self.fail_saves {
            return Err(SnapshotError::Persistence(
                "snapshot store rejected write".to_string(),
            ));
        }
        let encoded = encode(portfolio)?;
        let info = SnapshotInfo::new(portfolio.scope().clone(), portfolio.as_of(), &encoded);
        self.snapshots
            .write()
            .await
            .insert((portfolio.scope().clone(), portfolio.as_of()), encoded);
        Ok(info)
    }

    async fn list(&self, scope: &Scope) -> Result<Vec<SnapshotInfo>, SnapshotError> {
        let guard = self.snapshots.read().await;
        Ok(guard
            .iter()
            .filter(|((s, _), _)| s == scope)
            .map(|((s, as_of), encoded)| SnapshotInfo::new(s.clone(), *as_of, encoded))
            .collect())
    }
}
