//! Job executions started by HTTP handlers.
//!
//! Handlers claim the job before answering, so a conflicting request is
//! rejected with `409` instead of failing after the response. Execution then
//! continues on the state's [`TaskTracker`](tokio_util::task::TaskTracker)
//! so shutdown can wait for it. Failures past that point are logged, never
//! returned to the client.

use fanout_core::types::DbId;
use fanout_engine::JobClaim;

use crate::state::AppState;

/// Execute every pending task of the claimed job in the background.
pub fn spawn_execution(state: &AppState, claim: JobClaim) {
    let job_id = claim.job_id();
    state.tracker.spawn(async move {
        if let Err(e) = claim.execute().await {
            tracing::error!(job_id = %job_id, error = %e, "Background job execution failed");
        }
    });
}

/// Retry the failed tasks of the claimed job (or the given subset) in the
/// background.
pub fn spawn_retry(state: &AppState, claim: JobClaim, task_ids: Option<Vec<DbId>>) {
    let job_id = claim.job_id();
    state.tracker.spawn(async move {
        if let Err(e) = claim.retry(task_ids.as_deref()).await {
            tracing::error!(job_id = %job_id, error = %e, "Background job retry failed");
        }
    });
}
