//! Shared fixtures for engine integration tests.
//!
//! [`MockPlatform`] stands in for the remote platform: per-account resource
//! inventories, injectable failures, an artificial delay per call, and
//! a watcher recording how many tasks were running while calls were in flight.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fanout_core::account::{AccountAuth, AccountCredentials};
use fanout_core::job_config::{Binding, JobConfig};
use fanout_core::types::DbId;
use fanout_db::models::job::Job;
use fanout_db::models::status::TaskStatus;
use fanout_db::models::task::Task;
use fanout_db::repositories::TaskRepo;
use fanout_db::DbPool;
use fanout_engine::{AccountStore, Engine};
use fanout_events::EventBus;
use fanout_remote::{
    HealthStatus, RemoteConnector, RemoteError, RemoteOperations, RemoteResource,
};

// ---------------------------------------------------------------------------
// Mock platform
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockPlatform {
    inventories: Mutex<HashMap<String, Vec<String>>>,
    failing_accounts: Mutex<HashSet<String>>,
    failing_uploads: Mutex<HashSet<(String, String)>>,
    delay: Mutex<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    watched: Mutex<Option<(DbPool, DbId)>>,
    pub max_running: AtomicI64,
}

impl MockPlatform {
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Every call made with this account's credentials fails.
    pub fn fail_account(&self, account: &str) {
        self.failing_accounts.lock().unwrap().insert(account.to_string());
    }

    pub fn heal_all(&self) {
        self.failing_accounts.lock().unwrap().clear();
        self.failing_uploads.lock().unwrap().clear();
    }

    /// Content uploads for one resource on one account fail.
    pub fn fail_upload(&self, account: &str, resource: &str) {
        self.failing_uploads
            .lock()
            .unwrap()
            .insert((account.to_string(), resource.to_string()));
    }

    pub fn add_resource(&self, account: &str, resource: &str) {
        self.inventories
            .lock()
            .unwrap()
            .entry(account.to_string())
            .or_default()
            .push(resource.to_string());
    }

    pub fn resources(&self, account: &str) -> Vec<String> {
        self.inventories
            .lock()
            .unwrap()
            .get(account)
            .cloned()
            .unwrap_or_default()
    }

    /// Sample the job's running task count on every remote call.
    pub fn watch_running(&self, pool: DbPool, job_id: DbId) {
        *self.watched.lock().unwrap() = Some((pool, job_id));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, op: &str, account: &str) -> usize {
        let key = format!("{op}:{account}");
        self.calls().iter().filter(|c| **c == key).count()
    }
}

pub struct MockClient {
    platform: Arc<MockPlatform>,
    account: String,
}

impl MockClient {
    async fn call(&self, op: &str) -> Result<(), RemoteError> {
        let platform = &self.platform;
        let now = platform.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        platform.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let watched = platform.watched.lock().unwrap().clone();
        if let Some((pool, job_id)) = watched {
            let running = TaskRepo::count_in_status(&pool, job_id, TaskStatus::Running)
                .await
                .unwrap();
            platform.max_running.fetch_max(running, Ordering::SeqCst);
        }

        let delay = *platform.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        platform.in_flight.fetch_sub(1, Ordering::SeqCst);
        platform
            .calls
            .lock()
            .unwrap()
            .push(format!("{op}:{}", self.account));

        if platform.failing_accounts.lock().unwrap().contains(&self.account) {
            return Err(RemoteError::Api {
                status: 503,
                message: format!("{op} unavailable for {}", self.account),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteOperations for MockClient {
    async fn create_resource(&self, name: &str) -> Result<String, RemoteError> {
        self.call("create").await?;
        self.platform.add_resource(&self.account, name);
        Ok(name.to_string())
    }

    async fn upload_content(
        &self,
        _resource_id: &str,
        name: &str,
        _content: &str,
        _compatibility_date: Option<&str>,
        _bindings: &[Binding],
    ) -> Result<String, RemoteError> {
        self.call("upload").await?;
        let key = (self.account.clone(), name.to_string());
        if self.platform.failing_uploads.lock().unwrap().contains(&key) {
            return Err(RemoteError::Api {
                status: 400,
                message: format!("upload of {name} rejected"),
            });
        }
        Ok(format!("v-{name}"))
    }

    async fn activate(&self, _name: &str, version_id: &str) -> Result<String, RemoteError> {
        self.call("activate").await?;
        Ok(format!("d-{version_id}"))
    }

    async fn list_resources(&self) -> Result<Vec<RemoteResource>, RemoteError> {
        self.call("list").await?;
        Ok(self
            .platform
            .resources(&self.account)
            .into_iter()
            .map(|id| RemoteResource {
                id,
                created_on: Some("2025-01-01T00:00:00Z".into()),
                modified_on: None,
                etag: Some("etag".into()),
            })
            .collect())
    }

    async fn delete_resource(&self, resource_id: &str) -> Result<(), RemoteError> {
        self.call("delete").await?;
        let mut inventories = self.platform.inventories.lock().unwrap();
        let resources = inventories.entry(self.account.clone()).or_default();
        match resources.iter().position(|r| r == resource_id) {
            Some(pos) => {
                resources.remove(pos);
                Ok(())
            }
            None => Err(RemoteError::NotFound(format!("Resource {resource_id}"))),
        }
    }

    async fn get_public_suffix(&self) -> Result<String, RemoteError> {
        self.call("suffix").await?;
        Ok(format!("{}.example.dev", self.account))
    }

    async fn health_check(&self) -> Result<HealthStatus, RemoteError> {
        self.call("health").await?;
        Ok(HealthStatus {
            healthy: true,
            remote_account_id: self.account.clone(),
            account_name: None,
        })
    }
}

pub struct MockConnector(pub Arc<MockPlatform>);

impl RemoteConnector for MockConnector {
    fn connect(&self, credentials: &AccountCredentials) -> Arc<dyn RemoteOperations> {
        Arc::new(MockClient {
            platform: Arc::clone(&self.0),
            account: credentials.remote_account_id.clone(),
        })
    }
}

/// Accounts whose remote id equals their local id.
pub struct MockAccounts(pub HashSet<String>);

#[async_trait]
impl AccountStore for MockAccounts {
    async fn get_account(&self, id: &str) -> Result<Option<AccountCredentials>, sqlx::Error> {
        Ok(self.0.contains(id).then(|| AccountCredentials {
            id: id.to_string(),
            name: format!("Account {id}"),
            remote_account_id: id.to_string(),
            auth: AccountAuth::Token {
                api_token: format!("token-{id}"),
            },
        }))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub pool: DbPool,
    pub engine: Arc<Engine>,
    pub platform: Arc<MockPlatform>,
}

/// Engine over a fresh database with the given known accounts.
pub async fn harness(accounts: &[&str], concurrency: usize) -> Harness {
    let pool = fanout_db::create_memory_pool().await.unwrap();
    fanout_db::run_migrations(&pool).await.unwrap();

    let platform = Arc::new(MockPlatform::default());
    let engine = Engine::new(
        pool.clone(),
        Arc::new(EventBus::default()),
        Arc::new(MockConnector(Arc::clone(&platform))),
        Arc::new(MockAccounts(
            accounts.iter().map(|a| a.to_string()).collect(),
        )),
    )
    .with_concurrency(concurrency);

    Harness {
        pool,
        engine: Arc::new(engine),
        platform,
    }
}

pub fn ids(accounts: &[&str]) -> Vec<String> {
    accounts.iter().map(|a| a.to_string()).collect()
}

pub fn create_config(accounts: &[&str], name: &str) -> JobConfig {
    serde_json::from_value(serde_json::json!({
        "type": "create",
        "account_ids": ids(accounts),
        "resource_name": name,
        "content": "export default { fetch() { return new Response('ok') } }",
    }))
    .unwrap()
}

/// Tasks keyed by account id (first task per account).
pub fn by_account(tasks: &[Task]) -> HashMap<String, Task> {
    let mut map = HashMap::new();
    for task in tasks {
        map.entry(task.account_id.clone()).or_insert_with(|| task.clone());
    }
    map
}

/// A terminal job's counts must account for every task.
pub fn assert_counts_consistent(job: &Job, tasks: &[Task]) {
    assert_eq!(job.total_tasks, tasks.len() as i64);
    assert_eq!(job.completed_tasks + job.failed_tasks, job.total_tasks);
    let succeeded = tasks
        .iter()
        .filter(|t| t.status() == Some(TaskStatus::Success))
        .count() as i64;
    let failed = tasks
        .iter()
        .filter(|t| t.status() == Some(TaskStatus::Failed))
        .count() as i64;
    assert_eq!(job.completed_tasks, succeeded);
    assert_eq!(job.failed_tasks, failed);
}
