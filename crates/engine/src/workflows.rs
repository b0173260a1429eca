//! Per-kind remote workflows.
//!
//! Each workflow is a short fixed sequence of remote calls for one task. A
//! progress record is written and published as the task enters each step.
//! Workflows never retry; the first error ends the attempt.

use fanout_core::job_config::{Binding, JobConfig, JobKind};
use fanout_core::progress::{public_url, workflow_steps, TaskProgress};
use fanout_core::types::DbId;
use fanout_db::models::task::Task;
use fanout_db::repositories::TaskRepo;
use fanout_db::DbPool;
use fanout_events::EventBus;
use fanout_remote::{RemoteOperations, RemoteResource};
use serde_json::{json, Value};

use crate::error::TaskError;
use crate::notify::publish_task;

// ---------------------------------------------------------------------------
// Progress recording
// ---------------------------------------------------------------------------

/// Writes step progress for one task and publishes it.
pub struct StepRecorder<'a> {
    pool: &'a DbPool,
    bus: &'a EventBus,
    task_id: DbId,
    steps: &'static [&'static str],
}

impl<'a> StepRecorder<'a> {
    pub fn new(pool: &'a DbPool, bus: &'a EventBus, task_id: DbId, kind: JobKind) -> Self {
        Self {
            pool,
            bus,
            task_id,
            steps: workflow_steps(kind),
        }
    }

    /// Record entry into the step at `index` (0-based).
    async fn enter(&self, index: usize) -> Result<(), TaskError> {
        let step = self.steps.get(index).copied().unwrap_or("unknown");
        let progress = TaskProgress::new(step, index as u32 + 1, self.steps.len() as u32);
        self.write(progress).await
    }

    async fn enter_with_message(
        &self,
        index: usize,
        message: impl Into<String>,
    ) -> Result<(), TaskError> {
        let step = self.steps.get(index).copied().unwrap_or("unknown");
        let progress = TaskProgress::new(step, index as u32 + 1, self.steps.len() as u32)
            .with_message(message);
        self.write(progress).await
    }

    async fn write(&self, progress: TaskProgress) -> Result<(), TaskError> {
        tracing::debug!(
            task_id = %self.task_id,
            step = %progress.step,
            current = progress.current,
            total = progress.total,
            "Task progress",
        );
        if let Some(task) = TaskRepo::update_progress(self.pool, self.task_id, &progress).await? {
            publish_task(self.bus, &task);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run the workflow of `config`'s kind for one task. Returns the result
/// payload stored on success.
pub async fn run(
    steps: &StepRecorder<'_>,
    remote: &dyn RemoteOperations,
    config: &JobConfig,
    task: &Task,
) -> Result<Value, TaskError> {
    match config {
        JobConfig::Create(c) => {
            create(
                steps,
                remote,
                &c.resource_name,
                &c.content,
                c.compatibility_date.as_deref(),
                &c.bindings,
            )
            .await
        }
        JobConfig::Update(c) => {
            update(
                steps,
                remote,
                &c.resource_name,
                &c.content,
                c.compatibility_date.as_deref(),
                &c.bindings,
            )
            .await
        }
        JobConfig::Delete(c) => delete(steps, remote, &c.resource_name).await,
        JobConfig::Query(c) => query(steps, remote, &c.resource_name).await,
        JobConfig::List(_) => list(steps, remote).await,
        JobConfig::HealthCheck(_) => health_check(steps, remote).await,
        JobConfig::BatchUpdate(c) => {
            let name = batch_target(task)?;
            let mut result = update(
                steps,
                remote,
                name,
                &c.content,
                c.compatibility_date.as_deref(),
                &c.bindings,
            )
            .await?;
            result["resource_name"] = json!(name);
            Ok(result)
        }
        JobConfig::BatchDelete(_) => {
            let name = batch_target(task)?;
            let mut result = delete(steps, remote, name).await?;
            result["resource_name"] = json!(name);
            Ok(result)
        }
    }
}

fn batch_target(task: &Task) -> Result<&str, TaskError> {
    task.resource_name.as_deref().ok_or(TaskError::MissingTarget)
}

/// Find a resource by name in the account's inventory.
async fn locate(
    remote: &dyn RemoteOperations,
    name: &str,
) -> Result<Option<RemoteResource>, TaskError> {
    let resources = remote.list_resources().await?;
    Ok(resources.into_iter().find(|r| r.id == name))
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

async fn create(
    steps: &StepRecorder<'_>,
    remote: &dyn RemoteOperations,
    name: &str,
    content: &str,
    compatibility_date: Option<&str>,
    bindings: &[Binding],
) -> Result<Value, TaskError> {
    steps.enter(0).await?;
    let resource_id = remote.create_resource(name).await?;

    steps.enter(1).await?;
    let version_id = remote
        .upload_content(&resource_id, name, content, compatibility_date, bindings)
        .await?;

    steps.enter(2).await?;
    let deployment_id = remote.activate(name, &version_id).await?;

    let suffix = remote.get_public_suffix().await?;
    Ok(json!({
        "resource_id": resource_id,
        "version_id": version_id,
        "deployment_id": deployment_id,
        "url": public_url(name, &suffix),
    }))
}

async fn update(
    steps: &StepRecorder<'_>,
    remote: &dyn RemoteOperations,
    name: &str,
    content: &str,
    compatibility_date: Option<&str>,
    bindings: &[Binding],
) -> Result<Value, TaskError> {
    steps.enter(0).await?;
    let resource = locate(remote, name)
        .await?
        .ok_or_else(|| TaskError::ResourceNotFound(name.to_string()))?;

    steps.enter(1).await?;
    let version_id = remote
        .upload_content(&resource.id, name, content, compatibility_date, bindings)
        .await?;

    steps.enter(2).await?;
    let deployment_id = remote.activate(name, &version_id).await?;

    Ok(json!({
        "version_id": version_id,
        "deployment_id": deployment_id,
    }))
}

async fn delete(
    steps: &StepRecorder<'_>,
    remote: &dyn RemoteOperations,
    name: &str,
) -> Result<Value, TaskError> {
    steps.enter(0).await?;
    let resource = locate(remote, name)
        .await?
        .ok_or_else(|| TaskError::ResourceNotFound(name.to_string()))?;

    steps.enter(1).await?;
    remote.delete_resource(&resource.id).await?;

    Ok(json!({ "deleted": true }))
}

/// Unlike update and delete, an absent resource is a successful answer.
async fn query(
    steps: &StepRecorder<'_>,
    remote: &dyn RemoteOperations,
    name: &str,
) -> Result<Value, TaskError> {
    steps.enter(0).await?;
    let Some(resource) = locate(remote, name).await? else {
        return Ok(json!({ "found": false }));
    };

    steps.enter(1).await?;
    let suffix = remote.get_public_suffix().await?;

    Ok(json!({
        "found": true,
        "resource": resource,
        "url": public_url(name, &suffix),
    }))
}

async fn list(steps: &StepRecorder<'_>, remote: &dyn RemoteOperations) -> Result<Value, TaskError> {
    steps.enter(0).await?;
    let resources = remote.list_resources().await?;

    steps
        .enter_with_message(1, format!("{} resources", resources.len()))
        .await?;
    let suffix = remote.get_public_suffix().await?;

    let items: Vec<Value> = resources
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "url": public_url(&r.id, &suffix),
                "created_on": r.created_on,
                "modified_on": r.modified_on,
                "etag": r.etag,
            })
        })
        .collect();

    Ok(json!({
        "suffix": suffix,
        "count": resources.len(),
        "resources": items,
    }))
}

async fn health_check(
    steps: &StepRecorder<'_>,
    remote: &dyn RemoteOperations,
) -> Result<Value, TaskError> {
    steps.enter(0).await?;
    let status = remote.health_check().await?;
    Ok(json!(status))
}
