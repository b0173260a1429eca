//! Liveness of the service, its store and its execution engine.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"degraded"` when the database is unreachable.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    pub engine: EngineHealth,
}

/// Scheduler and execution load of the engine.
#[derive(Serialize)]
pub struct EngineHealth {
    /// Tasks admitted at once per job.
    pub concurrency: usize,
    /// Jobs with an execution or retry in progress.
    pub executing_jobs: usize,
    /// Open event subscriptions, e.g. SSE streams.
    pub event_subscribers: usize,
    /// Background executions not yet finished.
    pub background_executions: usize,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = fanout_db::health_check(&state.pool).await.is_ok();
    if !db_healthy {
        tracing::warn!("Health check could not reach the database");
    }

    let engine = &state.engine;
    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        engine: EngineHealth {
            concurrency: engine.concurrency(),
            executing_jobs: engine.executing_jobs(),
            event_subscribers: engine.bus().subscriber_count(),
            background_executions: state.tracker.len(),
        },
    })
}

/// Root-level routes, outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
