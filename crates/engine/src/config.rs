use std::time::Duration;

/// Default number of tasks allowed in flight per job execution.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Scheduler limit; never below 1.
    pub concurrency: usize,
    /// Remote platform API root.
    pub remote_api_base: String,
    /// Per-request timeout for remote calls in seconds.
    pub remote_timeout_secs: u64,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                                |
    /// |-----------------------|----------------------------------------|
    /// | `JOB_CONCURRENCY`     | `3`                                    |
    /// | `REMOTE_API_BASE`     | `https://api.cloudflare.com/client/v4` |
    /// | `REMOTE_TIMEOUT_SECS` | `30`                                   |
    pub fn from_env() -> Self {
        let concurrency: usize = std::env::var("JOB_CONCURRENCY")
            .unwrap_or_else(|_| DEFAULT_CONCURRENCY.to_string())
            .parse()
            .expect("JOB_CONCURRENCY must be a valid usize");

        let remote_api_base = std::env::var("REMOTE_API_BASE")
            .unwrap_or_else(|_| "https://api.cloudflare.com/client/v4".into());

        let remote_timeout_secs: u64 = std::env::var("REMOTE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REMOTE_TIMEOUT_SECS must be a valid u64");

        Self {
            concurrency: concurrency.max(1),
            remote_api_base,
            remote_timeout_secs,
        }
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            remote_api_base: "https://api.cloudflare.com/client/v4".into(),
            remote_timeout_secs: 30,
        }
    }
}
