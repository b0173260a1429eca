//! Job entity models and DTOs.

use fanout_core::job_config::JobConfig;
use fanout_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use super::status::{JobStatus, StatusId};

/// A row from the `jobs` table.
///
/// The task counts are only definitive once the status is terminal; they
/// are recomputed from the `tasks` table at completion time.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub job_type: String,
    pub status_id: StatusId,
    pub config: Json<JobConfig>,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub failed_tasks: i64,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl Job {
    /// Typed status, if the stored id is known.
    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::from_id(self.status_id)
    }
}

/// DTO for patching a job (all fields optional, `None` keeps the value).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateJob {
    pub status_id: Option<StatusId>,
    pub completed_tasks: Option<i64>,
    pub failed_tasks: Option<i64>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}
