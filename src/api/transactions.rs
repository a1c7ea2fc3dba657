use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::api::AppState;
use crate::datasource::parse_transactions_csv;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub parsed: usize,
    pub inserted: usize,
}

/// Import a manual transaction CSV. Rows whose `external_id` is already
/// stored are skipped; the whole body is rejected if any row is invalid.
pub async fn import_transactions(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportResponse>, AppError> {
    let transactions = parse_transactions_csv(body.as_bytes())?;
    let inserted = state.repo.insert_transactions_batch(&transactions).await?;

    info!(
        parsed = transactions.len(),
        inserted, "Imported transactions"
    );
    Ok(Json(ImportResponse {
        parsed: transactions.len(),
        inserted,
    }))
}
