//! Claims held across a handoff, and executions whose outcomes cannot be
//! written to the store.

mod common;

use assert_matches::assert_matches;
use common::{assert_counts_consistent, create_config, harness, Harness};
use fanout_core::types::DbId;
use fanout_db::models::status::{JobStatus, TaskStatus};
use fanout_engine::EngineError;
use fanout_events::ExecutionEvent;
use futures::{Stream, StreamExt};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reject every task update that moves a task into one of `statuses`.
async fn reject_task_statuses(h: &Harness, statuses: &[TaskStatus]) {
    let ids: Vec<String> = statuses.iter().map(|s| s.id().to_string()).collect();
    sqlx::query(&format!(
        "CREATE TRIGGER reject_outcome BEFORE UPDATE OF status_id ON tasks \
         WHEN NEW.status_id IN ({}) \
         BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END",
        ids.join(", ")
    ))
    .execute(&h.pool)
    .await
    .unwrap();
}

async fn allow_task_statuses(h: &Harness) {
    sqlx::query("DROP TRIGGER reject_outcome")
        .execute(&h.pool)
        .await
        .unwrap();
}

async fn until_terminal(events: impl Stream<Item = ExecutionEvent>) -> Vec<ExecutionEvent> {
    let mut events = Box::pin(events);
    let mut seen = Vec::new();
    while let Some(event) = events.next().await {
        let done = event.is_terminal();
        seen.push(event);
        if done {
            break;
        }
    }
    seen
}

async fn statuses(h: &Harness, job_id: DbId) -> Vec<Option<TaskStatus>> {
    h.engine
        .get_tasks(job_id)
        .await
        .unwrap()
        .iter()
        .map(|t| t.status())
        .collect()
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

#[tokio::test]
async fn claimed_job_rejects_other_executions_until_released() {
    let h = harness(&["a1", "a2"], 2).await;
    let job = h.engine.create_job(create_config(&["a1", "a2"], "svc")).await.unwrap();

    let claim = h.engine.claim_job(job.id).unwrap();
    assert_eq!(claim.job_id(), job.id);
    assert!(h.engine.is_executing(job.id));
    assert_eq!(h.engine.executing_jobs(), 1);

    assert_matches!(
        h.engine.claim_job(job.id),
        Err(EngineError::AlreadyRunning(id)) if id == job.id
    );
    assert_matches!(h.engine.execute_job(job.id).await, Err(EngineError::AlreadyRunning(_)));
    assert_matches!(
        h.engine.retry_failed_tasks(job.id, None).await,
        Err(EngineError::AlreadyRunning(_))
    );

    // An unused claim still frees the job.
    drop(claim);
    assert!(!h.engine.is_executing(job.id));

    let finished = h.engine.claim_job(job.id).unwrap().execute().await.unwrap();
    assert_eq!(finished.status(), Some(JobStatus::Completed));
    assert_eq!(h.engine.executing_jobs(), 0);
}

#[tokio::test]
async fn claimed_retry_reruns_failed_tasks() {
    let h = harness(&["a1", "a2"], 2).await;
    h.platform.fail_account("a2");
    let job = h.engine.create_job(create_config(&["a1", "a2"], "svc")).await.unwrap();
    h.engine.execute_job(job.id).await.unwrap();
    h.platform.heal_all();

    let retried = h.engine.claim_job(job.id).unwrap().retry(None).await.unwrap();

    assert_eq!(retried.status(), Some(JobStatus::Completed));
    assert!(!h.engine.is_executing(job.id));
}

// ---------------------------------------------------------------------------
// Store failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn result_that_cannot_be_stored_fails_the_task_and_the_job_settles() {
    let h = harness(&["a1", "a2"], 2).await;
    let job = h.engine.create_job(create_config(&["a1", "a2"], "svc")).await.unwrap();
    reject_task_statuses(&h, &[TaskStatus::Success]).await;

    let finished = h.engine.execute_job(job.id).await.unwrap();

    assert_eq!(finished.status(), Some(JobStatus::Failed));
    assert_eq!(finished.failed_tasks, 2);
    let tasks = h.engine.get_tasks(job.id).await.unwrap();
    assert_counts_consistent(&finished, &tasks);
    for task in &tasks {
        assert_eq!(task.status(), Some(TaskStatus::Failed));
        assert!(task
            .error
            .as_deref()
            .unwrap()
            .starts_with("Failed to record task result"));
    }

    allow_task_statuses(&h).await;
    let retried = h.engine.retry_failed_tasks(job.id, None).await.unwrap();
    assert_eq!(retried.status(), Some(JobStatus::Completed));
    assert_counts_consistent(&retried, &h.engine.get_tasks(job.id).await.unwrap());
}

#[tokio::test]
async fn unrecordable_outcome_aborts_without_finishing_the_job() {
    let h = harness(&["a1", "a2"], 2).await;
    let job = h.engine.create_job(create_config(&["a1", "a2"], "svc")).await.unwrap();
    reject_task_statuses(&h, &[TaskStatus::Success, TaskStatus::Failed]).await;
    let events = h.engine.subscribe(job.id);

    let result = h.engine.execute_job(job.id).await;
    assert_matches!(result, Err(EngineError::Store(_)));

    // No terminal status while tasks are still running.
    let stored = h.engine.get_job(job.id).await.unwrap();
    assert_eq!(stored.status(), Some(JobStatus::Running));
    assert!(stored.completed_at.is_none());
    assert_eq!(
        statuses(&h, job.id).await,
        [Some(TaskStatus::Running), Some(TaskStatus::Running)]
    );
    assert!(!h.engine.is_executing(job.id));

    let seen = until_terminal(events).await;
    assert_matches!(seen.first(), Some(ExecutionEvent::JobStarted { .. }));
    assert_matches!(
        seen.last(),
        Some(ExecutionEvent::JobAborted { job_id, error, .. })
            if *job_id == job.id && error.contains("disk I/O error")
    );

    // The next execution settles the interrupted tasks as failed.
    allow_task_statuses(&h).await;
    let settled = h.engine.execute_job(job.id).await.unwrap();
    assert_eq!(settled.status(), Some(JobStatus::Failed));
    let tasks = h.engine.get_tasks(job.id).await.unwrap();
    assert_counts_consistent(&settled, &tasks);
    assert!(tasks
        .iter()
        .all(|t| t.error.as_deref() == Some("Task execution was interrupted")));

    let retried = h.engine.retry_failed_tasks(job.id, None).await.unwrap();
    assert_eq!(retried.status(), Some(JobStatus::Completed));
}

#[tokio::test]
async fn retry_with_nothing_to_do_publishes_the_stored_outcome() {
    let h = harness(&["a1"], 1).await;
    let job = h.engine.create_job(create_config(&["a1"], "svc")).await.unwrap();
    h.engine.execute_job(job.id).await.unwrap();
    let events = h.engine.subscribe(job.id);

    h.engine.retry_failed_tasks(job.id, None).await.unwrap();

    let seen = until_terminal(events).await;
    assert_eq!(seen.len(), 1);
    assert_matches!(
        &seen[0],
        ExecutionEvent::JobFinished { status, completed_tasks: 1, failed_tasks: 0, .. }
            if status == "completed"
    );
}
