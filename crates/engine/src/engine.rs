//! The execution engine: submission, execution, retry and the read path.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use fanout_core::error::CoreError;
use fanout_core::job_config::JobConfig;
use fanout_core::outcome::derive_outcome;
use fanout_core::types::DbId;
use fanout_db::models::job::Job;
use fanout_db::models::status::{JobStatus, TaskStatus};
use fanout_db::models::task::Task;
use fanout_db::repositories::{JobRepo, TaskCounts, TaskRepo};
use fanout_db::DbPool;
use fanout_events::{EventBus, ExecutionEvent};
use fanout_remote::RemoteConnector;
use futures::Stream;

use crate::accounts::AccountStore;
use crate::config::DEFAULT_CONCURRENCY;
use crate::error::{EngineError, TaskError};
use crate::notify::{job_snapshot, publish_task};
use crate::scheduler::run_bounded;
use crate::workflows::{self, StepRecorder};

/// Owns the job and task lifecycle.
///
/// Shared via `Arc<Engine>`. Job counts are never tracked in memory; they
/// are re-derived from the task table when an execution finishes. The only
/// in-memory state is the set of jobs currently executing, which rejects
/// overlapping executions of the same job.
pub struct Engine {
    pool: DbPool,
    bus: Arc<EventBus>,
    connector: Arc<dyn RemoteConnector>,
    accounts: Arc<dyn AccountStore>,
    concurrency: usize,
    running: Mutex<HashSet<DbId>>,
}

/// Removes a job from the executing set when dropped.
struct RunGuard<'a> {
    engine: &'a Engine,
    job_id: DbId,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.engine.release(self.job_id);
    }
}

/// Owned right to execute one job.
///
/// Taken with [`Engine::claim_job`] before an execution is handed off to a
/// background task, so a conflicting request is rejected while the caller
/// can still answer it. The job leaves the executing set when the claim is
/// dropped, whether or not it was used.
pub struct JobClaim {
    engine: Arc<Engine>,
    job_id: DbId,
}

impl JobClaim {
    pub fn job_id(&self) -> DbId {
        self.job_id
    }

    /// Execute every pending task of the claimed job.
    pub async fn execute(self) -> Result<Job, EngineError> {
        self.engine.execute_claimed(self.job_id).await
    }

    /// Reset failed tasks of the claimed job and execute them again.
    pub async fn retry(self, task_ids: Option<&[DbId]>) -> Result<Job, EngineError> {
        self.engine.retry_claimed(self.job_id, task_ids).await
    }
}

impl fmt::Debug for JobClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobClaim")
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}

impl Drop for JobClaim {
    fn drop(&mut self) {
        self.engine.release(self.job_id);
    }
}

impl Engine {
    pub fn new(
        pool: DbPool,
        bus: Arc<EventBus>,
        connector: Arc<dyn RemoteConnector>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            pool,
            bus,
            connector,
            accounts,
            concurrency: DEFAULT_CONCURRENCY,
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Set the scheduler limit. Values below 1 are raised to 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // ---- submission ----

    /// Validate `config` and persist a pending job with one task per target.
    ///
    /// Nothing is written when validation fails. The job and all its tasks
    /// are committed together.
    pub async fn create_job(&self, config: JobConfig) -> Result<Job, EngineError> {
        config.validate()?;
        let targets = config.targets();
        let (job, _) = JobRepo::create_with_tasks(&self.pool, &config, &targets).await?;

        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            total_tasks = job.total_tasks,
            "Job created",
        );
        Ok(job)
    }

    // ---- execution ----

    /// Execute every pending task of a job and settle its status.
    ///
    /// Fails with `NotFound` if the job is absent and with `AlreadyRunning`
    /// if an execution or retry of the same job is in progress.
    pub async fn execute_job(&self, job_id: DbId) -> Result<Job, EngineError> {
        let _guard = self.claim(job_id)?;
        self.execute_claimed(job_id).await
    }

    /// Reset failed tasks to pending and execute them again.
    ///
    /// With `task_ids` given (and non-empty) only those tasks are retried;
    /// ids that are not failed tasks of this job are ignored. When nothing
    /// is selected the job is returned untouched.
    pub async fn retry_failed_tasks(
        &self,
        job_id: DbId,
        task_ids: Option<&[DbId]>,
    ) -> Result<Job, EngineError> {
        let _guard = self.claim(job_id)?;
        self.retry_claimed(job_id, task_ids).await
    }

    /// Mark `job_id` as executing until the returned claim is dropped.
    ///
    /// Fails with `AlreadyRunning` if an execution or retry of the job is in
    /// progress. The job's existence is not checked here.
    pub fn claim_job(self: &Arc<Self>, job_id: DbId) -> Result<JobClaim, EngineError> {
        self.acquire(job_id)?;
        Ok(JobClaim {
            engine: Arc::clone(self),
            job_id,
        })
    }

    /// Whether an execution or retry of the job is in progress.
    pub fn is_executing(&self, job_id: DbId) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&job_id)
    }

    /// Number of jobs currently executing.
    pub fn executing_jobs(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn claim(&self, job_id: DbId) -> Result<RunGuard<'_>, EngineError> {
        self.acquire(job_id)?;
        Ok(RunGuard {
            engine: self,
            job_id,
        })
    }

    fn acquire(&self, job_id: DbId) -> Result<(), EngineError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(job_id) {
            return Err(EngineError::AlreadyRunning(job_id));
        }
        Ok(())
    }

    fn release(&self, job_id: DbId) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job_id);
    }

    async fn retry_claimed(
        &self,
        job_id: DbId,
        task_ids: Option<&[DbId]>,
    ) -> Result<Job, EngineError> {
        match self.reset_failed(job_id, task_ids).await {
            Ok((job, 0)) => {
                tracing::info!(job_id = %job_id, "No failed tasks to retry");
                self.bus.publish(job_snapshot(&job));
                Ok(job)
            }
            Ok((_, reset)) => {
                tracing::info!(job_id = %job_id, tasks = reset, "Retrying failed tasks");
                self.execute_claimed(job_id).await
            }
            Err(e) => Err(self.abort(job_id, e)),
        }
    }

    /// Reset the selected failed tasks to pending. Returns the job as it was
    /// before the reset and how many tasks were reset.
    async fn reset_failed(
        &self,
        job_id: DbId,
        task_ids: Option<&[DbId]>,
    ) -> Result<(Job, usize), EngineError> {
        let job = self.get_job(job_id).await?;
        self.fail_interrupted(job_id).await?;

        let failed = TaskRepo::list_by_job_and_status(&self.pool, job_id, TaskStatus::Failed).await?;
        let selected: Vec<Task> = match task_ids {
            Some(ids) if !ids.is_empty() => {
                let ignored = ids
                    .iter()
                    .filter(|id| !failed.iter().any(|t| t.id == **id))
                    .count();
                if ignored > 0 {
                    tracing::warn!(
                        job_id = %job_id,
                        ignored,
                        "Retry ids that are not failed tasks of this job were ignored",
                    );
                }
                failed.into_iter().filter(|t| ids.contains(&t.id)).collect()
            }
            _ => failed,
        };

        for task in &selected {
            if TaskRepo::reset_for_retry(&self.pool, task.id).await? {
                tracing::info!(
                    job_id = %job_id,
                    task_id = %task.id,
                    account_id = %task.account_id,
                    retry_count = task.retry_count + 1,
                    previous_error = task.error.as_deref().unwrap_or_default(),
                    "Task reset for retry",
                );
            }
        }

        Ok((job, selected.len()))
    }

    /// Run the job to a settled status, or publish `job_aborted` so
    /// subscribers are not left waiting when that is impossible.
    async fn execute_claimed(&self, job_id: DbId) -> Result<Job, EngineError> {
        self.run_and_settle(job_id)
            .await
            .map_err(|e| self.abort(job_id, e))
    }

    fn abort(&self, job_id: DbId, error: EngineError) -> EngineError {
        tracing::error!(job_id = %job_id, error = %error, "Job execution aborted");
        self.bus.publish(ExecutionEvent::job_aborted(job_id, error.to_string()));
        error
    }

    async fn run_and_settle(&self, job_id: DbId) -> Result<Job, EngineError> {
        let job = self.get_job(job_id).await?;
        self.fail_interrupted(job_id).await?;
        let config = job.config.0;
        let pending = TaskRepo::list_by_job_and_status(&self.pool, job_id, TaskStatus::Pending).await?;

        JobRepo::mark_started(&self.pool, job_id).await?;
        self.bus
            .publish(ExecutionEvent::job_started(job_id, pending.len()));
        tracing::info!(
            job_id = %job_id,
            job_type = %config.kind(),
            pending_tasks = pending.len(),
            concurrency = self.concurrency,
            "Job execution started",
        );

        let outcomes =
            run_bounded(pending, self.concurrency, |task| self.execute_task(&config, task)).await;
        if let Some(e) = outcomes.into_iter().find_map(Result::err) {
            return Err(e.into());
        }

        let counts = TaskRepo::count_by_job(&self.pool, job_id).await?;
        ensure_settled(job_id, &counts)?;
        let status = JobStatus::from(derive_outcome(counts.total, counts.failed));
        let finished = JobRepo::finish(&self.pool, job_id, status, counts.succeeded, counts.failed)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "job",
                id: job_id,
            })?;

        self.bus.publish(ExecutionEvent::job_finished(
            job_id,
            status.name(),
            counts.succeeded,
            counts.failed,
        ));
        tracing::info!(
            job_id = %job_id,
            status = status.name(),
            completed_tasks = counts.succeeded,
            failed_tasks = counts.failed,
            total_tasks = counts.total,
            "Job execution finished",
        );
        Ok(finished)
    }

    /// Fail tasks still marked running from an execution that aborted.
    ///
    /// Callers hold the job's claim, so no task of it can be in flight.
    async fn fail_interrupted(&self, job_id: DbId) -> Result<(), sqlx::Error> {
        let failed =
            TaskRepo::fail_running(&self.pool, job_id, "Task execution was interrupted").await?;
        if failed > 0 {
            tracing::warn!(
                job_id = %job_id,
                tasks = failed,
                "Failed tasks left running by an earlier execution",
            );
        }
        Ok(())
    }

    /// Run one task to a terminal status.
    ///
    /// A store error is returned only when no terminal status could be
    /// written; sibling tasks keep running either way.
    async fn execute_task(&self, config: &JobConfig, task: Task) -> Result<(), sqlx::Error> {
        let task_id = task.id;
        self.try_execute_task(config, task).await.inspect_err(|e| {
            tracing::error!(task_id = %task_id, error = %e, "Failed to record task outcome");
        })
    }

    async fn try_execute_task(&self, config: &JobConfig, task: Task) -> Result<(), sqlx::Error> {
        let Some(task) = TaskRepo::mark_running(&self.pool, task.id).await? else {
            tracing::warn!(task_id = %task.id, "Task is no longer pending, skipping");
            return Ok(());
        };
        publish_task(&self.bus, &task);

        let settled = match self.run_workflow(config, &task).await {
            Ok(result) => {
                tracing::debug!(task_id = %task.id, account_id = %task.account_id, "Task succeeded");
                match TaskRepo::mark_succeeded(&self.pool, task.id, &result).await {
                    Ok(settled) => settled,
                    Err(e) => {
                        tracing::warn!(
                            task_id = %task.id,
                            error = %e,
                            "Failed to record task result, marking task failed",
                        );
                        let message = format!("Failed to record task result: {e}");
                        TaskRepo::mark_failed(&self.pool, task.id, &message).await?
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    task_id = %task.id,
                    account_id = %task.account_id,
                    error = %e,
                    "Task failed",
                );
                TaskRepo::mark_failed(&self.pool, task.id, &e.to_string()).await?
            }
        };

        if let Some(task) = settled {
            publish_task(&self.bus, &task);
        }
        Ok(())
    }

    async fn run_workflow(&self, config: &JobConfig, task: &Task) -> Result<serde_json::Value, TaskError> {
        let credentials = self
            .accounts
            .get_account(&task.account_id)
            .await?
            .ok_or(TaskError::AccountNotFound)?;
        let remote = self.connector.connect(&credentials);
        let steps = StepRecorder::new(&self.pool, &self.bus, task.id, config.kind());
        workflows::run(&steps, remote.as_ref(), config, task).await
    }

    // ---- read path ----

    pub async fn get_job(&self, job_id: DbId) -> Result<Job, EngineError> {
        JobRepo::find_by_id(&self.pool, job_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "job",
                    id: job_id,
                }
                .into()
            })
    }

    /// Most recent jobs first. `limit` defaults to 50 and is capped at 100.
    pub async fn list_jobs(&self, limit: Option<i64>) -> Result<Vec<Job>, EngineError> {
        Ok(JobRepo::list_recent(&self.pool, limit).await?)
    }

    /// Tasks of a job in creation order.
    pub async fn get_tasks(&self, job_id: DbId) -> Result<Vec<Task>, EngineError> {
        self.get_job(job_id).await?;
        Ok(TaskRepo::list_by_job(&self.pool, job_id).await?)
    }

    pub async fn get_task(&self, task_id: DbId) -> Result<Task, EngineError> {
        TaskRepo::find_by_id(&self.pool, task_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "task",
                    id: task_id,
                }
                .into()
            })
    }

    /// Delete a job and, by cascade, its tasks.
    ///
    /// A job that is currently executing cannot be deleted.
    pub async fn delete_job(&self, job_id: DbId) -> Result<(), EngineError> {
        if self.is_executing(job_id) {
            return Err(CoreError::Conflict(format!("Job {job_id} is executing")).into());
        }
        if !JobRepo::delete(&self.pool, job_id).await? {
            return Err(CoreError::NotFound {
                entity: "job",
                id: job_id,
            }
            .into());
        }
        tracing::info!(job_id = %job_id, "Job deleted");
        Ok(())
    }

    /// Stream of the job's task updates and lifecycle events from now on.
    pub fn subscribe(&self, job_id: DbId) -> impl Stream<Item = ExecutionEvent> + Send + 'static {
        self.bus.subscribe_job(job_id)
    }
}

/// A job may only be finished once none of its tasks is pending or running.
fn ensure_settled(job_id: DbId, counts: &TaskCounts) -> Result<(), CoreError> {
    if counts.unsettled() > 0 {
        return Err(CoreError::Internal(format!(
            "Job {job_id} has {} unsettled tasks after execution",
            counts.unsettled(),
        )));
    }
    Ok(())
}
