//! Shared fixtures for API integration tests.
//!
//! The app runs over an in-memory database with seeded accounts and a stub
//! remote platform. Submitted jobs execute on the state's task tracker;
//! [`settle`] waits for them.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use fanout_api::config::ServerConfig;
use fanout_api::router::build_app_router;
use fanout_api::state::AppState;
use fanout_core::account::{AccountAuth, AccountCredentials};
use fanout_core::job_config::{AccountsConfig, Binding, JobConfig};
use fanout_db::models::account::CreateAccount;
use fanout_db::repositories::AccountRepo;
use fanout_engine::{Engine, SqlAccountStore};
use fanout_events::EventBus;
use fanout_remote::{
    HealthStatus, RemoteConnector, RemoteError, RemoteOperations, RemoteResource,
};
use http_body_util::BodyExt;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

// ---------------------------------------------------------------------------
// Stub remote platform
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StubPlatform {
    inventories: Mutex<HashMap<String, Vec<String>>>,
    broken: Mutex<HashSet<String>>,
}

impl StubPlatform {
    /// Every call for this remote account fails until [`heal`](Self::heal).
    pub fn break_account(&self, account: &str) {
        self.broken.lock().unwrap().insert(account.to_string());
    }

    pub fn heal(&self) {
        self.broken.lock().unwrap().clear();
    }

    pub fn resources(&self, account: &str) -> Vec<String> {
        self.inventories
            .lock()
            .unwrap()
            .get(account)
            .cloned()
            .unwrap_or_default()
    }
}

struct StubClient {
    platform: Arc<StubPlatform>,
    account: String,
}

impl StubClient {
    fn check(&self) -> Result<(), RemoteError> {
        if self.platform.broken.lock().unwrap().contains(&self.account) {
            return Err(RemoteError::Api {
                status: 500,
                message: format!("account {} is down", self.account),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteOperations for StubClient {
    async fn create_resource(&self, name: &str) -> Result<String, RemoteError> {
        self.check()?;
        self.platform
            .inventories
            .lock()
            .unwrap()
            .entry(self.account.clone())
            .or_default()
            .push(name.to_string());
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
        self.check()?;
        Ok(format!("v-{name}"))
    }

    async fn activate(&self, _name: &str, version_id: &str) -> Result<String, RemoteError> {
        self.check()?;
        Ok(format!("d-{version_id}"))
    }

    async fn list_resources(&self) -> Result<Vec<RemoteResource>, RemoteError> {
        self.check()?;
        Ok(self
            .platform
            .resources(&self.account)
            .into_iter()
            .map(|id| RemoteResource {
                id,
                created_on: None,
                modified_on: None,
                etag: None,
            })
            .collect())
    }

    async fn delete_resource(&self, resource_id: &str) -> Result<(), RemoteError> {
        self.check()?;
        let mut inventories = self.platform.inventories.lock().unwrap();
        let resources = inventories.entry(self.account.clone()).or_default();
        resources.retain(|r| r != resource_id);
        Ok(())
    }

    async fn get_public_suffix(&self) -> Result<String, RemoteError> {
        self.check()?;
        Ok(format!("{}.example.dev", self.account))
    }

    async fn health_check(&self) -> Result<HealthStatus, RemoteError> {
        self.check()?;
        Ok(HealthStatus {
            healthy: true,
            remote_account_id: self.account.clone(),
            account_name: None,
        })
    }
}

struct StubConnector(Arc<StubPlatform>);

impl RemoteConnector for StubConnector {
    fn connect(&self, credentials: &AccountCredentials) -> Arc<dyn RemoteOperations> {
        Arc::new(StubClient {
            platform: Arc::clone(&self.0),
            account: credentials.remote_account_id.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub platform: Arc<StubPlatform>,
}

/// Build the full application router over a fresh database with the given
/// accounts seeded. Each account's remote id equals its local id.
pub async fn build_test_app(accounts: &[&str]) -> TestApp {
    let pool = fanout_db::create_memory_pool().await.unwrap();
    fanout_db::run_migrations(&pool).await.unwrap();

    for id in accounts {
        AccountRepo::create(
            &pool,
            &CreateAccount {
                id: id.to_string(),
                name: format!("Account {id}"),
                remote_account_id: id.to_string(),
                auth: AccountAuth::Token {
                    api_token: format!("token-{id}"),
                },
            },
        )
        .await
        .unwrap();
    }

    let platform = Arc::new(StubPlatform::default());
    let engine = Engine::new(
        pool.clone(),
        Arc::new(EventBus::default()),
        Arc::new(StubConnector(Arc::clone(&platform))),
        Arc::new(SqlAccountStore::new(pool.clone())),
    )
    .with_concurrency(2);

    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine: Arc::new(engine),
        tracker: TaskTracker::new(),
    };

    TestApp {
        app: build_app_router(state.clone(), &config),
        state,
        platform,
    }
}

/// A `list` job over the given accounts.
pub fn list_config(accounts: &[&str]) -> JobConfig {
    JobConfig::List(AccountsConfig {
        account_ids: accounts.iter().map(|a| a.to_string()).collect(),
    })
}

/// Wait until every background execution spawned so far has finished.
pub async fn settle(state: &AppState) {
    state.tracker.close();
    state.tracker.wait().await;
    state.tracker.reopen();
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Body::empty()).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Body::empty()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Body::from(body.to_string())).await
}

async fn send(app: Router, method: Method, uri: &str, body: Body) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
