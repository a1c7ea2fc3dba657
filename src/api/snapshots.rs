use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::db::SnapshotInfo;
use crate::domain::TimeMs;
use crate::error::AppError;
use crate::orchestration::DEFAULT_GENESIS_MS;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotsQuery {
    pub scope: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotsResponse {
    pub snapshots: Vec<SnapshotInfo>,
}

pub async fn list_snapshots(
    Query(params): Query<SnapshotsQuery>,
    State(state): State<AppState>,
) -> Result<Json<SnapshotsResponse>, AppError> {
    let scope = state.scope(&params.scope)?;
    let snapshots = state.service.list_snapshots(&scope).await?;
    Ok(Json(SnapshotsResponse { snapshots }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisQuery {
    pub scope: String,
    pub at_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisResponse {
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotInfo>,
}

/// Create the empty starting snapshot for a scope. Responds 201 when created
/// and 200 when the scope already had snapshots.
pub async fn create_genesis(
    Query(params): Query<GenesisQuery>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<GenesisResponse>), AppError> {
    let scope = state.scope(&params.scope)?;
    let at = TimeMs::new(params.at_ms.unwrap_or(DEFAULT_GENESIS_MS));

    let snapshot = state.service.ensure_genesis(&scope, at).await?;
    let status = if snapshot.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(GenesisResponse {
            created: snapshot.is_some(),
            snapshot,
        }),
    ))
}
