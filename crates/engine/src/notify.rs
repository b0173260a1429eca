//! Publishing task and job rows on the event bus.

use fanout_db::models::job::Job;
use fanout_db::models::task::Task;
use fanout_events::{EventBus, ExecutionEvent, TaskUpdate};

fn task_update(task: &Task) -> TaskUpdate {
    TaskUpdate {
        job_id: task.job_id,
        task_id: task.id,
        account_id: task.account_id.clone(),
        resource_name: task.resource_name.clone(),
        status: task
            .status()
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| task.status_id.to_string()),
        progress: task.progress.as_ref().map(|p| p.0.clone()),
        result: task.result.as_ref().map(|r| r.0.clone()),
        error: task.error.clone(),
        retry_count: task.retry_count,
        timestamp: task.updated_at,
    }
}

/// Publish the current state of `task` to job subscribers.
pub(crate) fn publish_task(bus: &EventBus, task: &Task) {
    bus.publish(ExecutionEvent::TaskUpdated(task_update(task)));
}

/// Terminal event describing a job that is not executing.
///
/// A settled job reports its stored outcome as `job_finished`; any other
/// job reports `job_aborted`.
pub fn job_snapshot(job: &Job) -> ExecutionEvent {
    match job.status() {
        Some(status) if status.is_terminal() => ExecutionEvent::job_finished(
            job.id,
            status.name(),
            job.completed_tasks,
            job.failed_tasks,
        ),
        _ => ExecutionEvent::job_aborted(job.id, format!("Job {} is not executing", job.id)),
    }
}
