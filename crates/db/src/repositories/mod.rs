//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&SqlitePool` as the first argument. Repositories carry no
//! business rules; callers decide what to write.

pub mod account_repo;
pub mod job_repo;
pub mod task_repo;

pub use account_repo::AccountRepo;
pub use job_repo::JobRepo;
pub use task_repo::{TaskCounts, TaskRepo};
