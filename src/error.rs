use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::datasource::{CsvImportError, SourceError};
use crate::db::SnapshotError;
use crate::pipeline::ReportError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// Stored ledger data cannot be processed as requested.
    #[error("Unprocessable ledger data: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<SnapshotError> for AppError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::NotFound { .. } => AppError::NotFound(err.to_string()),
            SnapshotError::Codec(_) => AppError::Conflict(err.to_string()),
            SnapshotError::Persistence(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::UnknownScope(_) | SourceError::InvalidCursor(_) => {
                AppError::BadRequest(err.to_string())
            }
            SourceError::InvalidRow { .. } => AppError::Conflict(err.to_string()),
            SourceError::Database(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidWindow { .. } => AppError::BadRequest(err.to_string()),
            ReportError::Ledger(_) => AppError::Conflict(err.to_string()),
            ReportError::Snapshot(e) => e.into(),
            ReportError::Source(e) => e.into(),
        }
    }
}

impl From<CsvImportError> for AppError {
    fn from(err: CsvImportError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
