use anyhow::Context;
use capgains::api::{create_router, AppState};
use capgains::config::Config;
use capgains::datasource::TransactionSource;
use capgains::db::{init_db, Repository, SnapshotStore};
use capgains::orchestration::ReportService;
use capgains::pipeline::ReportingPipeline;
use capgains::pricing::{CoinbasePriceOracle, PriceOracle};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("cannot open ledger database {}", config.database_path))?;

    let repo = Arc::new(Repository::new(pool).with_scope_filters(config.scope_filters.clone()));
    let source: Arc<dyn TransactionSource> = repo.clone();
    let snapshots: Arc<dyn SnapshotStore> = repo.clone();
    let oracle: Arc<dyn PriceOracle> = Arc::new(
        CoinbasePriceOracle::new(config.price_api_url.clone(), config.valuation_currency.clone())
            .with_tolerance_ms(config.price_tolerance_ms),
    );

    let pipeline =
        ReportingPipeline::new(source, oracle, snapshots).with_page_size(config.page_size);
    let service = Arc::new(ReportService::new(pipeline, config.valuation_currency.clone()));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let scopes: Vec<String> = config.scope_filters.keys().map(|s| s.to_string()).collect();
    let app = create_router(AppState::new(repo, config, service));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    tracing::info!(%addr, scopes = ?scopes, "Capital gains service listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
