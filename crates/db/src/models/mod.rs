//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts, where rows are created directly
//! - An update DTO (all `Option` fields) for patches

pub mod account;
pub mod job;
pub mod status;
pub mod task;
