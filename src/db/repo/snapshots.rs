//! Portfolio snapshot operations for the repository.

use crate::db::snapshot_store::{SnapshotError, SnapshotInfo, SnapshotStore};
use crate::domain::{Scope, TimeMs};
use crate::engine::snapshot::{decode, encode};
use crate::engine::{EncodedSnapshot, Portfolio};
use async_trait::async_trait;
use sqlx::Row;
use tracing::debug;

use super::Repository;

fn version_from_row(version: i64) -> Result<u32, SnapshotError> {
    u32::try_from(version)
        .map_err(|_| SnapshotError::Persistence(format!("invalid snapshot version {}", version)))
}

#[async_trait]
impl SnapshotStore for Repository {
    async fn load(&self, scope: &Scope, as_of: TimeMs) -> Result<Portfolio, SnapshotError> {
        let row = sqlx::query(
            r#"
            SELECT version, digest, payload
            FROM portfolio_snapshots
            WHERE scope = ? AND as_of_ms = ?
            "#,
        )
        .bind(scope.as_str())
        .bind(as_of.as_ms())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| SnapshotError::NotFound {
            scope: scope.clone(),
            as_of,
        })?;

        let encoded = EncodedSnapshot {
            version: version_from_row(row.try_get("version")?)?,
            digest: row.try_get("digest")?,
            payload: row.try_get("payload")?,
        };
        debug!(scope = %scope, as_of = %as_of, version = encoded.version, "Loaded snapshot");
        Ok(decode(&encoded)?)
    }

    async fn save(&self, portfolio: &Portfolio) -> Result<SnapshotInfo, SnapshotError> {
        let encoded = encode(portfolio)?;

        sqlx::query(
            r#"
            INSERT INTO portfolio_snapshots (scope, as_of_ms, version, digest, payload, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(scope, as_of_ms) DO UPDATE SET
                version = excluded.version,
                digest = excluded.digest,
                payload = excluded.payload,
                created_at_ms = excluded.created_at_ms
            "#,
        )
        .bind(portfolio.scope().as_str())
        .bind(portfolio.as_of().as_ms())
        .bind(i64::from(encoded.version))
        .bind(encoded.digest.as_str())
        .bind(encoded.payload.as_slice())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        debug!(
            scope = %portfolio.scope(),
            as_of = %portfolio.as_of(),
            digest = %encoded.digest,
            "Saved snapshot"
        );

        Ok(SnapshotInfo {
            scope: portfolio.scope().clone(),
            as_of_ms: portfolio.as_of().as_ms(),
            version: encoded.version,
            digest: encoded.digest,
        })
    }

    async fn list(&self, scope: &Scope) -> Result<Vec<SnapshotInfo>, SnapshotError> {
        let rows = sqlx::query(
            r#"
            SELECT as_of_ms, version, digest
            FROM portfolio_snapshots
            WHERE scope = ?
            ORDER BY as_of_ms ASC
            "#,
        )
        .bind(scope.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SnapshotInfo, SnapshotError> {
                Ok(SnapshotInfo {
                    scope: scope.clone(),
                    as_of_ms: row.try_get("as_of_ms")?,
                    version: version_from_row(row.try_get("version")?)?,
                    digest: row.try_get("digest")?,
                })
            })
            .collect()
    }
}
