pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, metrics::MetricsHandle, state::AppState, telemetry};
use crate::repositories::store::PgGradingStore;
use crate::services::ai_grading::AiGradingService;
use crate::services::audit::PgAuditLog;
use crate::services::storage::DocumentStorage;
use crate::services::text_extraction::MarkerTextExtractor;
use crate::tasks::grading::GradingOrchestrator;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    let metrics = MetricsHandle::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let orchestrator = GradingOrchestrator::new(
        Arc::new(PgGradingStore::new(db_pool.clone())),
        AiGradingService::from_settings(&settings)?,
        Arc::new(DocumentStorage::from_settings(&settings).await?),
        Arc::new(MarkerTextExtractor::from_settings(&settings)?),
        Arc::new(PgAuditLog::new(db_pool.clone())),
    );

    let state = AppState::new(settings, db_pool.clone(), metrics, Arc::new(orchestrator));
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Gradeflow API listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            core::shutdown::shutdown_signal().await;
        })
        .await;

    let running = state.jobs().running_count().await;
    if running > 0 {
        tracing::warn!(running, "Shutting down with batch jobs still running");
    }
    db_pool.close().await;
    tracing::info!("Database pool closed");

    result?;

    Ok(())
}
