use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::domain::TimeMs;
use crate::error::AppError;
use crate::pipeline::CapGainsReport;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub scope: String,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

pub async fn get_report(
    Query(params): Query<ReportQuery>,
    State(state): State<AppState>,
) -> Result<Json<CapGainsReport>, AppError> {
    let scope = state.scope(&params.scope)?;
    let start = params
        .start_ms
        .map(TimeMs::new)
        .ok_or_else(|| AppError::BadRequest("startMs is required".to_string()))?;
    let end = params
        .end_ms
        .map(TimeMs::new)
        .ok_or_else(|| AppError::BadRequest("endMs is required".to_string()))?;

    if start >= end {
        return Err(AppError::BadRequest(
            "startMs must be < endMs".to_string(),
        ));
    }

    let report = state.service.run_report(&scope, start, end).await?;
    Ok(Json(report))
}
