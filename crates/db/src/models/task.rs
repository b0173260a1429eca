//! Task entity models and DTOs.

use fanout_core::progress::TaskProgress;
use fanout_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use super::status::{StatusId, TaskStatus};

/// A row from the `tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: DbId,
    pub job_id: DbId,
    /// 0-based index in the job's target set; admission follows this order.
    pub position: i32,
    pub account_id: String,
    /// Set only for batch jobs, which target one resource per task.
    pub resource_name: Option<String>,
    pub status_id: StatusId,
    pub progress: Option<Json<TaskProgress>>,
    pub result: Option<Json<serde_json::Value>>,
    pub error: Option<String>,
    pub retry_count: i32,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl Task {
    /// Typed status, if the stored id is known.
    pub fn status(&self) -> Option<TaskStatus> {
        TaskStatus::from_id(self.status_id)
    }
}

/// DTO for patching a task (all fields optional, `None` keeps the value).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTask {
    pub status_id: Option<StatusId>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}
