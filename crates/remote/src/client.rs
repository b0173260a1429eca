//! The operations a workflow may perform against one remote account.

use std::sync::Arc;

use async_trait::async_trait;
use fanout_core::account::AccountCredentials;
use fanout_core::job_config::Binding;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// One deployed resource as reported by the platform inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteResource {
    /// Resource id; on this platform it is also the resource name.
    pub id: String,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub modified_on: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
}

/// Liveness of one account's credentials against the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub remote_account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
}

/// Single remote actions, each one request against one account.
///
/// Implementations never retry internally; every failure is reported once
/// as a [`RemoteError`].
#[async_trait]
pub trait RemoteOperations: Send + Sync {
    /// Create an empty placeholder resource. Returns its id.
    async fn create_resource(&self, name: &str) -> Result<String, RemoteError>;

    /// Upload a new content version. Returns the version id.
    async fn upload_content(
        &self,
        resource_id: &str,
        name: &str,
        content: &str,
        compatibility_date: Option<&str>,
        bindings: &[Binding],
    ) -> Result<String, RemoteError>;

    /// Route all traffic of `name` to `version_id`. Returns the deployment id.
    async fn activate(&self, name: &str, version_id: &str) -> Result<String, RemoteError>;

    async fn list_resources(&self) -> Result<Vec<RemoteResource>, RemoteError>;

    async fn delete_resource(&self, resource_id: &str) -> Result<(), RemoteError>;

    /// Host suffix under which resources are served, e.g. `team.workers.dev`.
    async fn get_public_suffix(&self) -> Result<String, RemoteError>;

    async fn health_check(&self) -> Result<HealthStatus, RemoteError>;
}

/// Builds a [`RemoteOperations`] client bound to one account's credentials.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, credentials: &AccountCredentials) -> Arc<dyn RemoteOperations>;
}
