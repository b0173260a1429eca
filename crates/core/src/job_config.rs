//! Job kinds, per-kind configuration and submission validation.
//!
//! [`JobConfig`] is a tagged union keyed by job kind. It is stored verbatim
//! in the `jobs.config` column and dispatched with exhaustive matching by
//! the engine, so no workflow can read a field that its kind does not carry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Job kind
// ---------------------------------------------------------------------------

/// The operation a job performs on every target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Create,
    Update,
    Delete,
    Query,
    List,
    HealthCheck,
    BatchUpdate,
    BatchDelete,
}

impl JobKind {
    /// Every kind, in declaration order.
    pub const ALL: [JobKind; 8] = [
        JobKind::Create,
        JobKind::Update,
        JobKind::Delete,
        JobKind::Query,
        JobKind::List,
        JobKind::HealthCheck,
        JobKind::BatchUpdate,
        JobKind::BatchDelete,
    ];

    /// Name stored in `jobs.job_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Query => "query",
            Self::List => "list",
            Self::HealthCheck => "health_check",
            Self::BatchUpdate => "batch_update",
            Self::BatchDelete => "batch_delete",
        }
    }

    /// Batch kinds fan out over explicit (account, resource) pairs instead
    /// of a plain account list.
    pub fn is_batch(self) -> bool {
        matches!(self, Self::BatchUpdate | Self::BatchDelete)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job type: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// A resource binding attached to uploaded content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Binding {
    PlainText { name: String, text: String },
    SecretText { name: String, text: String },
    KvNamespace { name: String, namespace_id: String },
    D1 { name: String, database_id: String },
    R2Bucket { name: String, bucket_name: String },
}

impl Binding {
    pub fn name(&self) -> &str {
        match self {
            Self::PlainText { name, .. }
            | Self::SecretText { name, .. }
            | Self::KvNamespace { name, .. }
            | Self::D1 { name, .. }
            | Self::R2Bucket { name, .. } => name,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-kind configuration
// ---------------------------------------------------------------------------

/// Content to upload and activate (create / update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    pub account_ids: Vec<String>,
    pub resource_name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

/// A single named resource on every account (delete / query).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedResourceConfig {
    pub account_ids: Vec<String>,
    pub resource_name: String,
}

/// Account-only fan-out (list / health check).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsConfig {
    pub account_ids: Vec<String>,
}

/// One (account, resource) pair targeted by a batch job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTarget {
    pub account_id: String,
    pub resource_name: String,
}

/// New content for many explicit (account, resource) pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUpdateConfig {
    pub targets: Vec<ResourceTarget>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

/// Deletion of many explicit (account, resource) pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDeleteConfig {
    pub targets: Vec<ResourceTarget>,
}

/// Type-specific job configuration, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobConfig {
    Create(DeployConfig),
    Update(DeployConfig),
    Delete(NamedResourceConfig),
    Query(NamedResourceConfig),
    List(AccountsConfig),
    HealthCheck(AccountsConfig),
    BatchUpdate(BatchUpdateConfig),
    BatchDelete(BatchDeleteConfig),
}

/// The unit of work a single task operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTarget {
    pub account_id: String,
    /// Present only for batch kinds.
    pub resource_name: Option<String>,
}

impl JobConfig {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Create(_) => JobKind::Create,
            Self::Update(_) => JobKind::Update,
            Self::Delete(_) => JobKind::Delete,
            Self::Query(_) => JobKind::Query,
            Self::List(_) => JobKind::List,
            Self::HealthCheck(_) => JobKind::HealthCheck,
            Self::BatchUpdate(_) => JobKind::BatchUpdate,
            Self::BatchDelete(_) => JobKind::BatchDelete,
        }
    }

    /// Expand the target set, one entry per task, in submission order.
    pub fn targets(&self) -> Vec<TaskTarget> {
        match self {
            Self::Create(c) | Self::Update(c) => per_account(&c.account_ids),
            Self::Delete(c) | Self::Query(c) => per_account(&c.account_ids),
            Self::List(c) | Self::HealthCheck(c) => per_account(&c.account_ids),
            Self::BatchUpdate(c) => per_pair(&c.targets),
            Self::BatchDelete(c) => per_pair(&c.targets),
        }
    }

    /// Reject malformed submissions before anything is persisted.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::Create(c) | Self::Update(c) => {
                validate_account_ids(&c.account_ids)?;
                require_non_blank("resource_name", &c.resource_name)?;
                require_non_blank("content", &c.content)?;
                validate_bindings(&c.bindings)
            }
            Self::Delete(c) | Self::Query(c) => {
                validate_account_ids(&c.account_ids)?;
                require_non_blank("resource_name", &c.resource_name)
            }
            Self::List(c) | Self::HealthCheck(c) => validate_account_ids(&c.account_ids),
            Self::BatchUpdate(c) => {
                validate_resource_targets(&c.targets)?;
                require_non_blank("content", &c.content)?;
                validate_bindings(&c.bindings)
            }
            Self::BatchDelete(c) => validate_resource_targets(&c.targets),
        }
    }
}

fn per_account(account_ids: &[String]) -> Vec<TaskTarget> {
    account_ids
        .iter()
        .map(|account_id| TaskTarget {
            account_id: account_id.clone(),
            resource_name: None,
        })
        .collect()
}

fn per_pair(targets: &[ResourceTarget]) -> Vec<TaskTarget> {
    targets
        .iter()
        .map(|t| TaskTarget {
            account_id: t.account_id.clone(),
            resource_name: Some(t.resource_name.clone()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn require_non_blank(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_account_ids(account_ids: &[String]) -> Result<(), CoreError> {
    if account_ids.is_empty() {
        return Err(CoreError::Validation(
            "account_ids must contain at least one account".into(),
        ));
    }
    if account_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(CoreError::Validation(
            "account_ids must not contain blank entries".into(),
        ));
    }
    Ok(())
}

fn validate_resource_targets(targets: &[ResourceTarget]) -> Result<(), CoreError> {
    if targets.is_empty() {
        return Err(CoreError::Validation(
            "targets must contain at least one (account_id, resource_name) pair".into(),
        ));
    }
    for (index, target) in targets.iter().enumerate() {
        if target.account_id.trim().is_empty() || target.resource_name.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "targets[{index}] must have account_id and resource_name"
            )));
        }
    }
    Ok(())
}

fn validate_bindings(bindings: &[Binding]) -> Result<(), CoreError> {
    let mut seen = std::collections::HashSet::new();
    for binding in bindings {
        require_non_blank("binding name", binding.name())?;
        if !seen.insert(binding.name()) {
            return Err(CoreError::Validation(format!(
                "duplicate binding name: {}",
                binding.name()
            )));
        }
    }
    Ok(())
}
