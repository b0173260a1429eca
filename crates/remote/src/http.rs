//! REST client for the remote platform's v4 JSON API.
//!
//! Every response is wrapped in an envelope
//! `{ "success": bool, "errors": [{code, message}], "result": T }`; failures
//! are flattened into a [`RemoteError`] carrying the platform's messages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fanout_core::account::{AccountAuth, AccountCredentials};
use fanout_core::job_config::Binding;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::client::{HealthStatus, RemoteConnector, RemoteOperations, RemoteResource};
use crate::error::RemoteError;

/// Module file name used for uploaded content.
const MAIN_MODULE: &str = "worker.js";

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

/// Join envelope errors into one line, e.g. `"10007: script not found"`.
fn join_errors(errors: &[ApiMessage]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Deserialize)]
struct IdResult {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SubdomainResult {
    subdomain: String,
}

#[derive(Debug, Deserialize)]
struct AccountResult {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Platform metadata shape of one binding.
fn binding_metadata(binding: &Binding) -> serde_json::Value {
    match binding {
        Binding::PlainText { name, text } => {
            json!({ "type": "plain_text", "name": name, "text": text })
        }
        Binding::SecretText { name, text } => {
            json!({ "type": "secret_text", "name": name, "text": text })
        }
        Binding::KvNamespace { name, namespace_id } => {
            json!({ "type": "kv_namespace", "name": name, "namespace_id": namespace_id })
        }
        Binding::D1 { name, database_id } => {
            json!({ "type": "d1", "name": name, "id": database_id })
        }
        Binding::R2Bucket { name, bucket_name } => {
            json!({ "type": "r2_bucket", "name": name, "bucket_name": bucket_name })
        }
    }
}

// ---------------------------------------------------------------------------
// HttpRemoteClient
// ---------------------------------------------------------------------------

/// HTTP client acting on behalf of a single account.
pub struct HttpRemoteClient {
    client: reqwest::Client,
    base_url: String,
    account_id: String,
    auth: AccountAuth,
}

impl HttpRemoteClient {
    /// Create a client reusing an existing [`reqwest::Client`] so that
    /// connections are pooled across accounts.
    ///
    /// * `base_url` - API root, e.g. `https://api.cloudflare.com/client/v4`.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        credentials: &AccountCredentials,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_id: credentials.remote_account_id.clone(),
            auth: credentials.auth.clone(),
        }
    }

    fn account_url(&self, path: &str) -> String {
        format!("{}/accounts/{}{}", self.base_url, self.account_id, path)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.auth {
            AccountAuth::Token { api_token } => request.bearer_auth(api_token),
            AccountAuth::EmailKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    /// Send a request and unwrap the envelope's `result`.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let envelope = Self::send_envelope::<T>(request).await?;
        envelope
            .result
            .ok_or_else(|| RemoteError::Decode("response has no result".to_string()))
    }

    /// Send a request whose `result` is irrelevant.
    async fn send_unit(&self, request: RequestBuilder) -> Result<(), RemoteError> {
        Self::send_envelope::<serde_json::Value>(request).await?;
        Ok(())
    }

    async fn send_envelope<T: DeserializeOwned>(
        request: RequestBuilder,
    ) -> Result<Envelope<T>, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                .ok()
                .map(|e| join_errors(&e.errors))
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))?;
        if !envelope.success {
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message: join_errors(&envelope.errors),
            });
        }
        Ok(envelope)
    }
}

#[async_trait]
impl RemoteOperations for HttpRemoteClient {
    async fn create_resource(&self, name: &str) -> Result<String, RemoteError> {
        let request = self
            .request(Method::POST, self.account_url("/workers/workers"))
            .json(&json!({ "name": name }));
        let created: IdResult = self.send(request).await?;
        Ok(created.id)
    }

    async fn upload_content(
        &self,
        resource_id: &str,
        name: &str,
        content: &str,
        compatibility_date: Option<&str>,
        bindings: &[Binding],
    ) -> Result<String, RemoteError> {
        let mut metadata = json!({
            "main_module": MAIN_MODULE,
            "bindings": bindings.iter().map(binding_metadata).collect::<Vec<_>>(),
        });
        if let Some(date) = compatibility_date {
            metadata["compatibility_date"] = json!(date);
        }

        let form = Form::new()
            .part(
                "metadata",
                Part::text(metadata.to_string()).mime_str("application/json")?,
            )
            .part(
                MAIN_MODULE,
                Part::text(content.to_string())
                    .file_name(MAIN_MODULE)
                    .mime_str("application/javascript+module")?,
            );

        tracing::debug!(resource_id, name, "Uploading content version");
        let request = self
            .request(
                Method::POST,
                self.account_url(&format!("/workers/scripts/{name}/versions")),
            )
            .multipart(form);
        let version: IdResult = self.send(request).await?;
        Ok(version.id)
    }

    async fn activate(&self, name: &str, version_id: &str) -> Result<String, RemoteError> {
        let request = self
            .request(
                Method::POST,
                self.account_url(&format!("/workers/scripts/{name}/deployments")),
            )
            .json(&json!({
                "strategy": "percentage",
                "versions": [{ "version_id": version_id, "percentage": 100 }],
            }));
        let deployment: IdResult = self.send(request).await?;
        Ok(deployment.id)
    }

    async fn list_resources(&self) -> Result<Vec<RemoteResource>, RemoteError> {
        let request = self.request(Method::GET, self.account_url("/workers/scripts"));
        self.send(request).await
    }

    async fn delete_resource(&self, resource_id: &str) -> Result<(), RemoteError> {
        let request = self.request(
            Method::DELETE,
            self.account_url(&format!("/workers/scripts/{resource_id}")),
        );
        match self.send_unit(request).await {
            Err(RemoteError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(RemoteError::NotFound(format!("Resource {resource_id}")))
            }
            other => other,
        }
    }

    async fn get_public_suffix(&self) -> Result<String, RemoteError> {
        let request = self.request(Method::GET, self.account_url("/workers/subdomain"));
        let result: SubdomainResult = self.send(request).await?;
        Ok(format!("{}.workers.dev", result.subdomain))
    }

    async fn health_check(&self) -> Result<HealthStatus, RemoteError> {
        let request = self.request(Method::GET, self.account_url(""));
        let account: AccountResult = self.send(request).await?;
        Ok(HealthStatus {
            healthy: true,
            remote_account_id: account.id,
            account_name: account.name,
        })
    }
}

// ---------------------------------------------------------------------------
// HttpConnector
// ---------------------------------------------------------------------------

/// Builds [`HttpRemoteClient`]s sharing one connection pool.
pub struct HttpConnector {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConnector {
    /// * `timeout` - applied to every remote request.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl RemoteConnector for HttpConnector {
    fn connect(&self, credentials: &AccountCredentials) -> Arc<dyn RemoteOperations> {
        Arc::new(HttpRemoteClient::with_client(
            self.client.clone(),
            self.base_url.clone(),
            credentials,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
