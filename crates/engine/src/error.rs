use fanout_core::error::CoreError;
use fanout_core::types::DbId;
use fanout_remote::RemoteError;

/// Errors from engine operations (submission, execution, retry, reads).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    /// Another execution or retry of this job is in progress.
    #[error("Job {0} is already executing")]
    AlreadyRunning(DbId),
}

/// Why a single task attempt failed.
///
/// The `Display` text is stored as the task's error message.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Account not found")]
    AccountNotFound,

    #[error("Resource {0} not found")]
    ResourceNotFound(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    /// A batch task without its resource name.
    #[error("Task has no target resource")]
    MissingTarget,
}
