//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                       -> list_jobs
/// POST   /create-workers         -> create_workers
/// POST   /update-workers         -> update_workers
/// POST   /delete-workers         -> delete_workers
/// POST   /query-workers          -> query_workers
/// POST   /list-workers           -> list_workers
/// POST   /health-check           -> health_check
/// POST   /batch-update-workers   -> batch_update_workers
/// POST   /batch-delete-workers   -> batch_delete_workers
/// GET    /{id}                   -> get_job
/// DELETE /{id}                   -> delete_job
/// GET    /{id}/tasks             -> list_job_tasks
/// POST   /{id}/retry             -> retry_job
/// GET    /{id}/events            -> job_events (SSE)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs))
        .route("/create-workers", post(jobs::create_workers))
        .route("/update-workers", post(jobs::update_workers))
        .route("/delete-workers", post(jobs::delete_workers))
        .route("/query-workers", post(jobs::query_workers))
        .route("/list-workers", post(jobs::list_workers))
        .route("/health-check", post(jobs::health_check))
        .route("/batch-update-workers", post(jobs::batch_update_workers))
        .route("/batch-delete-workers", post(jobs::batch_delete_workers))
        .route("/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/{id}/tasks", get(jobs::list_job_tasks))
        .route("/{id}/retry", post(jobs::retry_job))
        .route("/{id}/events", get(jobs::job_events))
}
