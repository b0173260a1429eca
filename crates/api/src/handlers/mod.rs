pub mod jobs;
pub mod tasks;
