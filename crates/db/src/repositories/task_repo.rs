//! Repository for the `tasks` table.
//!
//! Every write targets a single row by primary key, so concurrently running
//! tasks of the same job never contend for a row.

use chrono::Utc;
use fanout_core::progress::TaskProgress;
use fanout_core::types::DbId;
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

use crate::models::status::TaskStatus;
use crate::models::task::{Task, UpdateTask};

/// Column list for `tasks` queries.
pub(crate) const COLUMNS: &str = "\
    id, job_id, position, account_id, resource_name, status_id, \
    progress, result, error, retry_count, \
    created_at, started_at, completed_at, updated_at";

/// Per-status task counts for one job, from a single scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct TaskCounts {
    pub total: i64,
    pub pending: i64,
    pub running: i64,
    pub succeeded: i64,
    pub failed: i64,
}

impl TaskCounts {
    /// Tasks that have not reached a terminal status yet.
    pub fn unsettled(&self) -> i64 {
        self.pending + self.running
    }
}

/// Provides CRUD operations for tasks.
pub struct TaskRepo;

impl TaskRepo {
    /// Find a task by ID.
    pub async fn find_by_id(pool: &SqlitePool, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE id = ?1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all tasks of a job in creation order.
    pub async fn list_by_job(pool: &SqlitePool, job_id: DbId) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE job_id = ?1 ORDER BY position");
        sqlx::query_as::<_, Task>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }

    /// List the tasks of a job currently in `status`, in creation order.
    pub async fn list_by_job_and_status(
        pool: &SqlitePool,
        job_id: DbId,
        status: TaskStatus,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tasks \
             WHERE job_id = ?1 AND status_id = ?2 \
             ORDER BY position"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(job_id)
            .bind(status.id())
            .fetch_all(pool)
            .await
    }

    /// Count a job's tasks by status with one fresh scan.
    pub async fn count_by_job(pool: &SqlitePool, job_id: DbId) -> Result<TaskCounts, sqlx::Error> {
        sqlx::query_as::<_, TaskCounts>(
            "SELECT COUNT(*) AS total, \
                COALESCE(SUM(CASE WHEN status_id = ?2 THEN 1 ELSE 0 END), 0) AS pending, \
                COALESCE(SUM(CASE WHEN status_id = ?3 THEN 1 ELSE 0 END), 0) AS running, \
                COALESCE(SUM(CASE WHEN status_id = ?4 THEN 1 ELSE 0 END), 0) AS succeeded, \
                COALESCE(SUM(CASE WHEN status_id = ?5 THEN 1 ELSE 0 END), 0) AS failed \
             FROM tasks WHERE job_id = ?1",
        )
        .bind(job_id)
        .bind(TaskStatus::Pending.id())
        .bind(TaskStatus::Running.id())
        .bind(TaskStatus::Success.id())
        .bind(TaskStatus::Failed.id())
        .fetch_one(pool)
        .await
    }

    /// Count a job's tasks currently in `status`.
    pub async fn count_in_status(
        pool: &SqlitePool,
        job_id: DbId,
        status: TaskStatus,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks WHERE job_id = ?1 AND status_id = ?2",
        )
        .bind(job_id)
        .bind(status.id())
        .fetch_one(pool)
        .await
    }

    /// Patch a task. `None` fields keep their current value.
    pub async fn update(
        pool: &SqlitePool,
        id: DbId,
        input: &UpdateTask,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks SET \
                status_id = COALESCE(?2, status_id), \
                result = COALESCE(?3, result), \
                error = COALESCE(?4, error), \
                started_at = COALESCE(?5, started_at), \
                completed_at = COALESCE(?6, completed_at), \
                updated_at = ?7 \
             WHERE id = ?1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(input.status_id)
            .bind(input.result.as_ref().map(Json))
            .bind(&input.error)
            .bind(input.started_at)
            .bind(input.completed_at)
            .bind(Utc::now())
            .fetch_optional(pool)
            .await
    }

    /// Claim a pending task for execution: `pending -> running`.
    ///
    /// Returns `None` if the task is no longer pending.
    pub async fn mark_running(pool: &SqlitePool, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "UPDATE tasks SET status_id = ?2, started_at = ?3, updated_at = ?3 \
             WHERE id = ?1 AND status_id = ?4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(TaskStatus::Running.id())
            .bind(now)
            .bind(TaskStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Record a successful outcome with its result payload.
    pub async fn mark_succeeded(
        pool: &SqlitePool,
        id: DbId,
        result: &serde_json::Value,
    ) -> Result<Option<Task>, sqlx::Error> {
        Self::update(
            pool,
            id,
            &UpdateTask {
                status_id: Some(TaskStatus::Success.id()),
                result: Some(result.clone()),
                completed_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await
    }

    /// Record a failed outcome with its error message.
    pub async fn mark_failed(
        pool: &SqlitePool,
        id: DbId,
        error: &str,
    ) -> Result<Option<Task>, sqlx::Error> {
        Self::update(
            pool,
            id,
            &UpdateTask {
                status_id: Some(TaskStatus::Failed.id()),
                error: Some(error.to_string()),
                completed_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await
    }

    /// Fail every task of a job that is still `running`.
    ///
    /// Only valid while no execution of the job is in progress; used to
    /// settle tasks left behind by an aborted execution. Returns the number
    /// of tasks failed.
    pub async fn fail_running(
        pool: &SqlitePool,
        job_id: DbId,
        error: &str,
    ) -> Result<u64, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE tasks SET status_id = ?2, error = ?3, completed_at = ?4, updated_at = ?4 \
             WHERE job_id = ?1 AND status_id = ?5",
        )
        .bind(job_id)
        .bind(TaskStatus::Failed.id())
        .bind(error)
        .bind(now)
        .bind(TaskStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Overwrite the progress record of a task.
    pub async fn update_progress(
        pool: &SqlitePool,
        id: DbId,
        progress: &TaskProgress,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks SET progress = ?2, updated_at = ?3 WHERE id = ?1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(Json(progress))
            .bind(Utc::now())
            .fetch_optional(pool)
            .await
    }

    /// Reset a failed task to `pending` in place and bump its retry count.
    ///
    /// Result, error, progress and timestamps of the previous attempt are
    /// cleared; no attempt history is kept. Returns `false` if the task is
    /// not currently failed.
    pub async fn reset_for_retry(pool: &SqlitePool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET \
                status_id = ?2, retry_count = retry_count + 1, \
                progress = NULL, result = NULL, error = NULL, \
                started_at = NULL, completed_at = NULL, updated_at = ?3 \
             WHERE id = ?1 AND status_id = ?4",
        )
        .bind(id)
        .bind(TaskStatus::Pending.id())
        .bind(Utc::now())
        .bind(TaskStatus::Failed.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
