//! Execution event bus.
//!
//! - [`EventBus`] is the in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ExecutionEvent`] is the envelope for job and task lifecycle changes.
//! - [`EventBus::subscribe_job`] narrows the bus to one job as a `Stream`.

pub mod bus;

pub use bus::{EventBus, ExecutionEvent, TaskUpdate};
