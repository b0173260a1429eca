//! Shared domain types for the fanout bulk-operation engine.
//!
//! Pure data and rules only: no database, network or runtime dependencies
//! live here, so every other crate can depend on it.

pub mod account;
pub mod error;
pub mod job_config;
pub mod outcome;
pub mod progress;
pub mod types;
