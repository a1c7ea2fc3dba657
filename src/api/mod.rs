pub mod health;
pub mod reports;
pub mod snapshots;
pub mod transactions;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::Scope;
use crate::error::AppError;
use crate::orchestration::ReportService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub service: Arc<ReportService>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, service: Arc<ReportService>) -> Self {
        Self {
            repo,
            config,
            service,
        }
    }

    /// Resolve a scope query parameter against the configured scopes.
    pub(crate) fn scope(&self, raw: &str) -> Result<Scope, AppError> {
        let scope = Scope::new(raw.trim());
        if scope.as_str().is_empty() {
            return Err(AppError::BadRequest("scope is required".to_string()));
        }
        if !self.config.is_known_scope(&scope) {
            return Err(AppError::BadRequest(format!("Unknown scope: {}", scope)));
        }
        Ok(scope)
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/reports", get(reports::get_report))
        .route("/v1/snapshots", get(snapshots::list_snapshots))
        .route("/v1/snapshots/genesis", post(snapshots::create_genesis))
        .route(
            "/v1/transactions/import",
            post(transactions::import_transactions),
        )
        .layer(cors)
        .with_state(state)
}
