//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`ExecutionEvent`]s. The
//! engine publishes from concurrently running tasks; subscribers either take
//! the raw receiver or a per-job filtered stream. It is shared via
//! `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use fanout_core::progress::TaskProgress;
use fanout_core::types::DbId;
use futures::{future, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

// ---------------------------------------------------------------------------
// ExecutionEvent
// ---------------------------------------------------------------------------

/// Snapshot of one task after a state or progress change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub job_id: DbId,
    pub task_id: DbId,
    pub account_id: String,
    pub resource_name: Option<String>,
    /// Task status name, e.g. `"running"` or `"failed"`.
    pub status: String,
    pub progress: Option<TaskProgress>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub retry_count: i32,
    pub timestamp: DateTime<Utc>,
}

/// A lifecycle change of a job or one of its tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// Execution began for `pending_tasks` of the job's tasks.
    JobStarted {
        job_id: DbId,
        pending_tasks: usize,
        timestamp: DateTime<Utc>,
    },
    TaskUpdated(TaskUpdate),
    /// Every selected task settled and the job status was re-derived.
    JobFinished {
        job_id: DbId,
        /// Job status name: `"completed"`, `"partial"` or `"failed"`.
        status: String,
        completed_tasks: i64,
        failed_tasks: i64,
        timestamp: DateTime<Utc>,
    },
    /// Execution stopped before the job could be settled. The job keeps its
    /// `running` status until a retry settles it.
    JobAborted {
        job_id: DbId,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn job_started(job_id: DbId, pending_tasks: usize) -> Self {
        Self::JobStarted {
            job_id,
            pending_tasks,
            timestamp: Utc::now(),
        }
    }

    pub fn job_finished(
        job_id: DbId,
        status: impl Into<String>,
        completed_tasks: i64,
        failed_tasks: i64,
    ) -> Self {
        Self::JobFinished {
            job_id,
            status: status.into(),
            completed_tasks,
            failed_tasks,
            timestamp: Utc::now(),
        }
    }

    pub fn job_aborted(job_id: DbId, error: impl Into<String>) -> Self {
        Self::JobAborted {
            job_id,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    /// The job this event belongs to.
    pub fn job_id(&self) -> DbId {
        match self {
            Self::JobStarted { job_id, .. }
            | Self::JobFinished { job_id, .. }
            | Self::JobAborted { job_id, .. } => *job_id,
            Self::TaskUpdated(update) => update.job_id,
        }
    }

    /// Short event name, used as the SSE `event:` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JobStarted { .. } => "job_started",
            Self::TaskUpdated(_) => "task_updated",
            Self::JobFinished { .. } => "job_finished",
            Self::JobAborted { .. } => "job_aborted",
        }
    }

    /// No further events follow for this execution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::JobFinished { .. } | Self::JobAborted { .. })
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// When the buffer is full the oldest un-consumed events are dropped and
/// slow receivers observe a lag. Per-job streams skip over the gap and keep
/// going.
///
/// ```rust
/// use fanout_events::{EventBus, ExecutionEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(ExecutionEvent::job_started(uuid::Uuid::now_v7(), 3));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped; the store remains the
    /// source of truth for task state.
    pub fn publish(&self, event: ExecutionEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to every event published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    /// Stream of the events of a single job, in publish order.
    ///
    /// Only events published after this call are observed. The stream never
    /// ends on its own; callers stop at [`ExecutionEvent::is_terminal`].
    pub fn subscribe_job(
        &self,
        job_id: DbId,
    ) -> impl Stream<Item = ExecutionEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| {
            let event = match item {
                Ok(event) if event.job_id() == job_id => Some(event),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(job_id = %job_id, skipped, "Job subscriber lagged, events dropped");
                    None
                }
            };
            future::ready(event)
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
