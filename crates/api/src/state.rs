use std::sync::Arc;

use fanout_engine::Engine;
use tokio_util::task::TaskTracker;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every field is behind an `Arc` or is a handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: fanout_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job submission, execution and the read path.
    pub engine: Arc<Engine>,
    /// Tracks job executions spawned by handlers so shutdown can drain them.
    pub tracker: TaskTracker,
}
