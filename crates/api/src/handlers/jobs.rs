//! Handlers for the `/jobs` resource.
//!
//! Submission handlers persist the job and its tasks, spawn execution in the
//! background and answer `202 Accepted` with the pending job. Callers follow
//! progress by polling the read endpoints or by subscribing to the job's
//! server-sent event stream.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::response::IntoResponse;
use axum::Json;
use fanout_core::job_config::{
    AccountsConfig, BatchDeleteConfig, BatchUpdateConfig, DeployConfig, JobConfig,
    NamedResourceConfig,
};
use fanout_core::types::DbId;
use fanout_db::models::job::Job;
use fanout_db::models::status::{JobStatus, TaskStatus};
use fanout_db::models::task::Task;
use fanout_engine::job_snapshot;
use fanout_events::ExecutionEvent;
use futures::stream::{self, BoxStream};
use futures::{future, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::background;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// A job with its status name alongside the stored status id.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    #[serde(flatten)]
    pub job: Job,
    pub status: &'static str,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        let status = job.status().map_or("unknown", JobStatus::name);
        Self { job, status }
    }
}

/// A task with its status name alongside the stored status id.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub task: Task,
    pub status: &'static str,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        let status = task.status().map_or("unknown", TaskStatus::name);
        Self { task, status }
    }
}

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListJobsParams {
    /// Defaults to 50.
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

/// Body of `POST /api/v1/jobs/{id}/retry`. An empty object retries every
/// failed task.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RetryRequest {
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub task_ids: Option<Vec<DbId>>,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

async fn submit(state: &AppState, config: JobConfig) -> AppResult<impl IntoResponse> {
    let job = state.engine.create_job(config).await?;
    let claim = state.engine.claim_job(job.id)?;
    background::spawn_execution(state, claim);

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: JobResponse::from(job),
        }),
    ))
}

/// POST /api/v1/jobs/create-workers
pub async fn create_workers(
    State(state): State<AppState>,
    Json(input): Json<DeployConfig>,
) -> AppResult<impl IntoResponse> {
    submit(&state, JobConfig::Create(input)).await
}

/// POST /api/v1/jobs/update-workers
pub async fn update_workers(
    State(state): State<AppState>,
    Json(input): Json<DeployConfig>,
) -> AppResult<impl IntoResponse> {
    submit(&state, JobConfig::Update(input)).await
}

/// POST /api/v1/jobs/delete-workers
pub async fn delete_workers(
    State(state): State<AppState>,
    Json(input): Json<NamedResourceConfig>,
) -> AppResult<impl IntoResponse> {
    submit(&state, JobConfig::Delete(input)).await
}

/// POST /api/v1/jobs/query-workers
pub async fn query_workers(
    State(state): State<AppState>,
    Json(input): Json<NamedResourceConfig>,
) -> AppResult<impl IntoResponse> {
    submit(&state, JobConfig::Query(input)).await
}

/// POST /api/v1/jobs/list-workers
pub async fn list_workers(
    State(state): State<AppState>,
    Json(input): Json<AccountsConfig>,
) -> AppResult<impl IntoResponse> {
    submit(&state, JobConfig::List(input)).await
}

/// POST /api/v1/jobs/health-check
pub async fn health_check(
    State(state): State<AppState>,
    Json(input): Json<AccountsConfig>,
) -> AppResult<impl IntoResponse> {
    submit(&state, JobConfig::HealthCheck(input)).await
}

/// POST /api/v1/jobs/batch-update-workers
pub async fn batch_update_workers(
    State(state): State<AppState>,
    Json(input): Json<BatchUpdateConfig>,
) -> AppResult<impl IntoResponse> {
    submit(&state, JobConfig::BatchUpdate(input)).await
}

/// POST /api/v1/jobs/batch-delete-workers
pub async fn batch_delete_workers(
    State(state): State<AppState>,
    Json(input): Json<BatchDeleteConfig>,
) -> AppResult<impl IntoResponse> {
    submit(&state, JobConfig::BatchDelete(input)).await
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Most recent jobs first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsParams>,
) -> AppResult<impl IntoResponse> {
    params.validate()?;
    let jobs: Vec<JobResponse> = state
        .engine
        .list_jobs(params.limit)
        .await?
        .into_iter()
        .map(JobResponse::from)
        .collect();

    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.engine.get_job(job_id).await?;
    Ok(Json(DataResponse {
        data: JobResponse::from(job),
    }))
}

/// GET /api/v1/jobs/{id}/tasks
///
/// Tasks in creation order.
pub async fn list_job_tasks(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let tasks: Vec<TaskResponse> = state
        .engine
        .get_tasks(job_id)
        .await?
        .into_iter()
        .map(TaskResponse::from)
        .collect();

    Ok(Json(DataResponse { data: tasks }))
}

// ---------------------------------------------------------------------------
// Retry / delete
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/retry
///
/// Resets failed tasks (all, or the listed subset) and executes them again
/// in the background. Answers with the job as it is before the retry runs,
/// or `409` while an execution or retry of the job is in progress.
pub async fn retry_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<RetryRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let job = state.engine.get_job(job_id).await?;
    let claim = state.engine.claim_job(job_id)?;
    background::spawn_retry(&state, claim, input.task_ids);

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: JobResponse::from(job),
        }),
    ))
}

/// DELETE /api/v1/jobs/{id}
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<StatusCode> {
    state.engine.delete_job(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

type EventStream = BoxStream<'static, Result<Event, axum::Error>>;

/// GET /api/v1/jobs/{id}/events
///
/// Server-sent events for the job, one per [`ExecutionEvent`], named after
/// the event type. The stream ends after `job_finished` or `job_aborted`.
/// A job that is not executing yields a single snapshot: `job_finished`
/// with its stored counts when settled, `job_aborted` otherwise.
pub async fn job_events(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<Sse<KeepAliveStream<EventStream>>> {
    // Subscribe before reading so nothing published in between is lost.
    let live = state.engine.subscribe(job_id);
    let executing = state.engine.is_executing(job_id);
    let job = state.engine.get_job(job_id).await?;
    let settled = job.status().is_some_and(JobStatus::is_terminal);

    let events = if executing && !settled {
        until_finished(live).boxed()
    } else {
        stream::once(future::ready(job_snapshot(&job))).boxed()
    };

    let stream: EventStream = events
        .map(|event| Event::default().event(event.name()).json_data(&event))
        .boxed();

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Pass events through up to and including the first terminal one.
fn until_finished<S>(events: S) -> impl Stream<Item = ExecutionEvent> + Send + 'static
where
    S: Stream<Item = ExecutionEvent> + Send + 'static,
{
    stream::unfold((Box::pin(events), false), |(mut events, done)| async move {
        if done {
            return None;
        }
        let event = events.next().await?;
        let done = event.is_terminal();
        Some((event, (events, done)))
    })
}
