//! Per-task progress records and the step plan of every workflow.
//!
//! A [`TaskProgress`] is written after each workflow step and published to
//! subscribers, so its `step` names are part of the observable surface.

use serde::{Deserialize, Serialize};

use crate::job_config::JobKind;

pub const STEP_CREATE_RESOURCE: &str = "create resource";
pub const STEP_UPLOAD_CONTENT: &str = "upload content";
pub const STEP_ACTIVATE: &str = "activate";
pub const STEP_LOCATE_RESOURCE: &str = "locate resource";
pub const STEP_DELETE_RESOURCE: &str = "delete resource";
pub const STEP_RESOLVE_URL: &str = "resolve public url";
pub const STEP_FETCH_INVENTORY: &str = "fetch inventory";
pub const STEP_CHECK_HEALTH: &str = "check health";

/// Snapshot of how far a task has advanced through its workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub step: String,
    pub current: u32,
    pub total: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskProgress {
    pub fn new(step: impl Into<String>, current: u32, total: u32) -> Self {
        Self {
            step: step.into(),
            current,
            total,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Ordered step names executed by the workflow of `kind`.
pub fn workflow_steps(kind: JobKind) -> &'static [&'static str] {
    match kind {
        JobKind::Create => &[STEP_CREATE_RESOURCE, STEP_UPLOAD_CONTENT, STEP_ACTIVATE],
        JobKind::Update | JobKind::BatchUpdate => {
            &[STEP_LOCATE_RESOURCE, STEP_UPLOAD_CONTENT, STEP_ACTIVATE]
        }
        JobKind::Delete | JobKind::BatchDelete => &[STEP_LOCATE_RESOURCE, STEP_DELETE_RESOURCE],
        JobKind::Query => &[STEP_LOCATE_RESOURCE, STEP_RESOLVE_URL],
        JobKind::List => &[STEP_FETCH_INVENTORY, STEP_RESOLVE_URL],
        JobKind::HealthCheck => &[STEP_CHECK_HEALTH],
    }
}

/// Public URL of a resource: `https://{name}.{suffix}`.
pub fn public_url(resource_name: &str, suffix: &str) -> String {
    format!("https://{resource_name}.{}", suffix.trim_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_non_empty_plan() {
        for kind in JobKind::ALL {
            assert!(!workflow_steps(kind).is_empty(), "{kind} has no steps");
        }
    }

    #[test]
    fn batch_plans_mirror_their_single_account_counterparts() {
        assert_eq!(
            workflow_steps(JobKind::BatchUpdate),
            workflow_steps(JobKind::Update)
        );
        assert_eq!(
            workflow_steps(JobKind::BatchDelete),
            workflow_steps(JobKind::Delete)
        );
    }

    #[test]
    fn public_url_joins_name_and_suffix() {
        assert_eq!(
            public_url("svc", "acme.workers.dev"),
            "https://svc.acme.workers.dev"
        );
        assert_eq!(
            public_url("svc", ".acme.workers.dev"),
            "https://svc.acme.workers.dev"
        );
    }

    #[test]
    fn message_is_omitted_from_json_when_absent() {
        let json = serde_json::to_value(TaskProgress::new(STEP_ACTIVATE, 3, 3)).unwrap();
        assert!(json.get("message").is_none());

        let json = serde_json::to_value(
            TaskProgress::new(STEP_ACTIVATE, 3, 3).with_message("deploying"),
        )
        .unwrap();
        assert_eq!(json["message"], "deploying");
    }
}
