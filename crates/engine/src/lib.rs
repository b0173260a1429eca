//! Job execution engine.
//!
//! Turns one submitted job into many tasks, runs them through the
//! bounded-concurrency [`scheduler`], drives each task's [`workflows`]
//! against the remote platform and derives the job outcome from a fresh scan
//! of task state.

pub mod accounts;
pub mod config;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod workflows;

mod notify;

pub use accounts::{AccountStore, SqlAccountStore};
pub use config::EngineConfig;
pub use engine::{Engine, JobClaim};
pub use error::{EngineError, TaskError};
pub use notify::job_snapshot;
