//! `HttpRemoteClient` against a local stand-in for the platform API.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use fanout_core::account::{AccountAuth, AccountCredentials};
use fanout_core::job_config::Binding;
use fanout_remote::{HttpConnector, RemoteConnector, RemoteError};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Fake platform
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Platform {
    scripts: Arc<Mutex<Vec<String>>>,
    seen_auth: Arc<Mutex<Vec<String>>>,
}

fn ok(result: Value) -> Json<Value> {
    Json(json!({ "success": true, "errors": [], "messages": [], "result": result }))
}

fn record_auth(platform: &Platform, headers: &HeaderMap) {
    let auth = headers
        .get("authorization")
        .or_else(|| headers.get("x-auth-key"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    platform.seen_auth.lock().unwrap().push(auth);
}

async fn create_worker(
    State(platform): State<Platform>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    record_auth(&platform, &headers);
    let name = body["name"].as_str().unwrap_or_default().to_string();
    platform.scripts.lock().unwrap().push(name.clone());
    ok(json!({ "id": name }))
}

async fn upload_version(Path((_, name)): Path<(String, String)>) -> Json<Value> {
    ok(json!({ "id": format!("v-{name}") }))
}

async fn deploy(Json(body): Json<Value>) -> Json<Value> {
    let version = body["versions"][0]["version_id"].as_str().unwrap_or_default();
    ok(json!({ "id": format!("d-{version}") }))
}

async fn list_scripts(State(platform): State<Platform>) -> Json<Value> {
    let scripts: Vec<Value> = platform
        .scripts
        .lock()
        .unwrap()
        .iter()
        .map(|id| json!({ "id": id, "etag": "e1", "created_on": "2025-01-01T00:00:00Z" }))
        .collect();
    ok(Value::Array(scripts))
}

async fn delete_script(
    State(platform): State<Platform>,
    Path((_, name)): Path<(String, String)>,
) -> (StatusCode, Json<Value>) {
    let mut scripts = platform.scripts.lock().unwrap();
    if let Some(pos) = scripts.iter().position(|s| *s == name) {
        scripts.remove(pos);
        (StatusCode::OK, ok(Value::Null))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "errors": [{ "code": 10007, "message": "This Worker does not exist" }],
                "messages": [],
                "result": null
            })),
        )
    }
}

async fn subdomain() -> Json<Value> {
    ok(json!({ "subdomain": "team" }))
}

async fn account(Path(account): Path<String>) -> (StatusCode, Json<Value>) {
    if account == "locked" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "success": false,
                "errors": [{ "code": 9109, "message": "Unauthorized to access requested resource" }],
                "messages": [],
                "result": null
            })),
        );
    }
    (StatusCode::OK, ok(json!({ "id": account, "name": "Team" })))
}

async fn spawn_platform() -> (SocketAddr, Platform) {
    let platform = Platform::default();
    let app = Router::new()
        .route("/accounts/{acct}", get(account))
        .route("/accounts/{acct}/workers/workers", post(create_worker))
        .route("/accounts/{acct}/workers/scripts", get(list_scripts))
        .route("/accounts/{acct}/workers/scripts/{name}", delete(delete_script))
        .route(
            "/accounts/{acct}/workers/scripts/{name}/versions",
            post(upload_version),
        )
        .route(
            "/accounts/{acct}/workers/scripts/{name}/deployments",
            post(deploy),
        )
        .route("/accounts/{acct}/workers/subdomain", get(subdomain))
        .with_state(platform.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, platform)
}

fn credentials(remote_account_id: &str, auth: AccountAuth) -> AccountCredentials {
    AccountCredentials {
        id: "local-1".into(),
        name: "Local".into(),
        remote_account_id: remote_account_id.into(),
        auth,
    }
}

fn connector(addr: SocketAddr) -> HttpConnector {
    HttpConnector::new(format!("http://{addr}"), Duration::from_secs(5)).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deploy_flow_returns_platform_ids() {
    let (addr, platform) = spawn_platform().await;
    let client = connector(addr).connect(&credentials(
        "cf-1",
        AccountAuth::Token {
            api_token: "tok".into(),
        },
    ));

    let id = client.create_resource("svc").await.unwrap();
    assert_eq!(id, "svc");

    let bindings = vec![Binding::PlainText {
        name: "MODE".into(),
        text: "prod".into(),
    }];
    let version = client
        .upload_content(&id, "svc", "export default {}", Some("2025-01-01"), &bindings)
        .await
        .unwrap();
    assert_eq!(version, "v-svc");

    let deployment = client.activate("svc", &version).await.unwrap();
    assert_eq!(deployment, "d-v-svc");

    assert_eq!(client.get_public_suffix().await.unwrap(), "team.workers.dev");
    assert_eq!(
        platform.seen_auth.lock().unwrap().first().map(String::as_str),
        Some("Bearer tok")
    );
}

#[tokio::test]
async fn list_and_delete_resources() {
    let (addr, _) = spawn_platform().await;
    let client = connector(addr).connect(&credentials(
        "cf-1",
        AccountAuth::EmailKey {
            email: "ops@example.com".into(),
            key: "gk".into(),
        },
    ));

    client.create_resource("alpha").await.unwrap();
    client.create_resource("beta").await.unwrap();

    let resources = client.list_resources().await.unwrap();
    let ids: Vec<_> = resources.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["alpha", "beta"]);
    assert_eq!(resources[0].etag.as_deref(), Some("e1"));
    assert!(resources[0].modified_on.is_none());

    client.delete_resource("alpha").await.unwrap();
    let missing = client.delete_resource("alpha").await;
    assert_matches!(missing, Err(RemoteError::NotFound(ref what)) if what == "Resource alpha");
}

#[tokio::test]
async fn api_errors_carry_platform_messages() {
    let (addr, _) = spawn_platform().await;
    let connector = connector(addr);

    let healthy = connector
        .connect(&credentials("cf-9", AccountAuth::Token { api_token: "t".into() }))
        .health_check()
        .await
        .unwrap();
    assert!(healthy.healthy);
    assert_eq!(healthy.remote_account_id, "cf-9");

    let err = connector
        .connect(&credentials("locked", AccountAuth::Token { api_token: "t".into() }))
        .health_check()
        .await
        .unwrap_err();
    assert_matches!(err, RemoteError::Api { status: 403, .. });
    assert_eq!(
        err.to_string(),
        "Remote API error (403): 9109: Unauthorized to access requested resource"
    );
}
