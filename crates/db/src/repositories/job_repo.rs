//! Repository for the `jobs` table.
//!
//! Uses `JobStatus` from `models::status` for all status transitions.

use chrono::Utc;
use fanout_core::job_config::{JobConfig, TaskTarget};
use fanout_core::types::{new_id, DbId};
use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::models::job::{Job, UpdateJob};
use crate::models::status::{JobStatus, TaskStatus};
use crate::models::task::Task;
use crate::repositories::task_repo::COLUMNS as TASK_COLUMNS;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status_id, config, total_tasks, completed_tasks, failed_tasks, \
    created_at, started_at, completed_at, updated_at";

/// Maximum page size for job listing.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
pub const DEFAULT_LIMIT: i64 = 50;

/// Provides CRUD operations for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a pending job and one pending task per target in a single
    /// transaction. Either every row commits or none do.
    pub async fn create_with_tasks(
        pool: &SqlitePool,
        config: &JobConfig,
        targets: &[TaskTarget],
    ) -> Result<(Job, Vec<Task>), sqlx::Error> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO jobs (id, job_type, status_id, config, total_tasks, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6) \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(new_id())
            .bind(config.kind().as_str())
            .bind(JobStatus::Pending.id())
            .bind(Json(config))
            .bind(targets.len() as i64)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO tasks \
                (id, job_id, position, account_id, resource_name, status_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) \
             RETURNING {TASK_COLUMNS}"
        );
        let mut tasks = Vec::with_capacity(targets.len());
        for (position, target) in targets.iter().enumerate() {
            let task = sqlx::query_as::<_, Task>(&query)
                .bind(new_id())
                .bind(job.id)
                .bind(position as i32)
                .bind(&target.account_id)
                .bind(&target.resource_name)
                .bind(TaskStatus::Pending.id())
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
            tasks.push(task);
        }

        tx.commit().await?;
        Ok((job, tasks))
    }

    /// Find a job by ID.
    pub async fn find_by_id(pool: &SqlitePool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = ?1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List jobs, newest first. `limit` defaults to 50 and is capped at 100.
    pub async fn list_recent(
        pool: &SqlitePool,
        limit: Option<i64>,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             ORDER BY created_at DESC, id DESC \
             LIMIT ?1"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Patch a job. `None` fields keep their current value.
    pub async fn update(
        pool: &SqlitePool,
        id: DbId,
        input: &UpdateJob,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET \
                status_id = COALESCE(?2, status_id), \
                completed_tasks = COALESCE(?3, completed_tasks), \
                failed_tasks = COALESCE(?4, failed_tasks), \
                started_at = COALESCE(?5, started_at), \
                completed_at = COALESCE(?6, completed_at), \
                updated_at = ?7 \
             WHERE id = ?1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(input.status_id)
            .bind(input.completed_tasks)
            .bind(input.failed_tasks)
            .bind(input.started_at)
            .bind(input.completed_at)
            .bind(Utc::now())
            .fetch_optional(pool)
            .await
    }

    /// Move a job to `running`, stamp `started_at` and clear any previous
    /// completion time.
    pub async fn mark_started(pool: &SqlitePool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "UPDATE jobs \
             SET status_id = ?2, started_at = ?3, completed_at = NULL, updated_at = ?3 \
             WHERE id = ?1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Running.id())
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Record the terminal status and the freshly recomputed task counts.
    pub async fn finish(
        pool: &SqlitePool,
        id: DbId,
        status: JobStatus,
        completed_tasks: i64,
        failed_tasks: i64,
    ) -> Result<Option<Job>, sqlx::Error> {
        Self::update(
            pool,
            id,
            &UpdateJob {
                status_id: Some(status.id()),
                completed_tasks: Some(completed_tasks),
                failed_tasks: Some(failed_tasks),
                started_at: None,
                completed_at: Some(Utc::now()),
            },
        )
        .await
    }

    /// Delete a job. Its tasks are removed by `ON DELETE CASCADE`.
    ///
    /// Returns `true` if a row was deleted.
    pub async fn delete(pool: &SqlitePool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
