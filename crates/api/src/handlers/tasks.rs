//! Handlers for the `/tasks` resource.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use fanout_core::types::DbId;

use crate::error::AppResult;
use crate::handlers::jobs::TaskResponse;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let task = state.engine.get_task(task_id).await?;
    Ok(Json(DataResponse {
        data: TaskResponse::from(task),
    }))
}
