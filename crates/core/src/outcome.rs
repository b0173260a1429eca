//! Aggregate job outcome derived from terminal task counts.
//!
//! The counts always come from a fresh scan of the task table, never from a
//! live counter, so this is a pure function of two numbers.

use serde::{Deserialize, Serialize};

/// Terminal status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    Partial,
    Failed,
}

/// Apply the status law: no failures is `Completed`, all failed is `Failed`,
/// anything in between is `Partial`.
pub fn derive_outcome(total_tasks: i64, failed_tasks: i64) -> JobOutcome {
    if failed_tasks == 0 {
        JobOutcome::Completed
    } else if failed_tasks == total_tasks {
        JobOutcome::Failed
    } else {
        JobOutcome::Partial
    }
}
