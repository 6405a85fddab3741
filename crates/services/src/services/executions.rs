use std::{collections::HashMap, sync::Arc};

use db::{
    DBService,
    models::{
        task_execution::{
            CreateTaskExecution, ExecutionStatus, ExecutionSyncUpdate, TaskExecution,
        },
        task_template::TaskTemplate,
    },
};
use serde::Deserialize;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

use super::browser_pod::{BrowserPod, BrowserPodError, RunTaskRequest};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("browser-pod call failed: {0}")]
    ExternalService(#[from] BrowserPodError),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ControlAction {
    Stop,
    Pause,
    Resume,
}

impl ControlAction {
    /// Local status mirrored after the matching remote command succeeds.
    pub fn mapped_status(self) -> ExecutionStatus {
        match self {
            ControlAction::Stop => ExecutionStatus::Stopped,
            ControlAction::Pause => ExecutionStatus::Paused,
            ControlAction::Resume => ExecutionStatus::Running,
        }
    }
}

/// Caller-supplied parameters layered over the template's stored
/// configuration when starting a run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionOverrides {
    pub secrets: Option<HashMap<String, String>>,
    pub included_file_names: Option<Vec<String>>,
    #[serde(default)]
    pub save_browser_data: bool,
}

/// Coordinates the local execution records with browser-pod. Every
/// operation takes the caller identity explicitly and runs to completion
/// within one request; the external call and the local write are
/// sequential, unsynchronized steps.
#[derive(Clone)]
pub struct ExecutionService {
    db: DBService,
    pod: Arc<dyn BrowserPod>,
}

impl ExecutionService {
    pub fn new(db: DBService, pod: Arc<dyn BrowserPod>) -> Self {
        Self { db, pod }
    }

    /// Submit a run for the given template and record it locally under
    /// the job id browser-pod assigns.
    pub async fn create(
        &self,
        user_id: &str,
        task_id: Uuid,
        overrides: ExecutionOverrides,
    ) -> Result<TaskExecution, ExecutionError> {
        let pool = &self.db.pool;
        let template = TaskTemplate::find_by_id_for_user(pool, task_id, user_id)
            .await?
            .ok_or(ExecutionError::NotFound("task"))?;

        let request = run_request_for(&template, &overrides);

        // Submission precedes the insert, so a failed submit leaves no
        // orphan record. The reverse window (submitted but not recorded)
        // is accepted and only logged.
        let remote_id = self.pod.run_task(&request).await?;

        let data = CreateTaskExecution {
            task_id,
            secrets: overrides
                .secrets
                .as_ref()
                .and_then(|secrets| serde_json::to_string(secrets).ok()),
            included_file_names: overrides
                .included_file_names
                .as_ref()
                .and_then(|names| serde_json::to_string(names).ok()),
            save_browser_data: overrides.save_browser_data,
        };
        let execution = TaskExecution::create(pool, &data, &remote_id, user_id)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    "execution {remote_id} submitted to browser-pod but not recorded locally: {e}"
                );
            })?;

        tracing::info!("created execution {} for task {}", execution.id, task_id);
        Ok(execution)
    }

    /// Forward a stop/pause/resume command and mirror the mapped status
    /// locally, but only once the remote command has succeeded.
    pub async fn control(
        &self,
        user_id: &str,
        execution_id: &str,
        action: &str,
    ) -> Result<TaskExecution, ExecutionError> {
        let action: ControlAction = action
            .parse()
            .map_err(|_| ExecutionError::Validation(format!("invalid control action {action:?}")))?;

        let pool = &self.db.pool;
        if TaskExecution::find_by_id_for_user(pool, execution_id, user_id)
            .await?
            .is_none()
        {
            return Err(ExecutionError::NotFound("execution"));
        }

        match action {
            ControlAction::Stop => self.pod.stop_task(execution_id).await?,
            ControlAction::Pause => self.pod.pause_task(execution_id).await?,
            ControlAction::Resume => self.pod.resume_task(execution_id).await?,
        }

        let execution =
            TaskExecution::update_status(pool, execution_id, action.mapped_status()).await?;
        tracing::info!("{action} acknowledged for execution {execution_id}");
        Ok(execution)
    }

    /// Pull the current remote state and overwrite the local record in a
    /// single update. The primary fetch failing fails the whole sync
    /// with nothing written; missing media degrade to empty lists.
    pub async fn sync(
        &self,
        user_id: &str,
        execution_id: &str,
    ) -> Result<TaskExecution, ExecutionError> {
        let pool = &self.db.pool;
        if TaskExecution::find_by_id_for_user(pool, execution_id, user_id)
            .await?
            .is_none()
        {
            return Err(ExecutionError::NotFound("execution"));
        }

        let remote = self.pod.get_task(execution_id).await?;

        let screenshots = or_empty(
            self.pod.get_screenshots(execution_id).await,
            "screenshots",
            execution_id,
        );
        let recordings = or_empty(
            self.pod.get_media(execution_id).await,
            "recordings",
            execution_id,
        );

        let update = ExecutionSyncUpdate {
            status: remote.status,
            output: remote.output,
            live_url: remote.live_url,
            public_share_url: remote.public_share_url,
            output_files: remote
                .output_files
                .as_ref()
                .and_then(|value| serde_json::to_string(value).ok()),
            screenshots: serde_json::to_string(&screenshots).ok(),
            recordings: serde_json::to_string(&recordings).ok(),
            steps: remote
                .steps
                .as_ref()
                .and_then(|value| serde_json::to_string(value).ok()),
            browser_data: remote
                .browser_data
                .as_ref()
                .and_then(|value| serde_json::to_string(value).ok()),
            finished_at: remote.finished_at,
        };
        Ok(TaskExecution::apply_sync(pool, execution_id, &update).await?)
    }

    /// Forget the record locally. The remote job is left in place.
    pub async fn delete(&self, user_id: &str, execution_id: &str) -> Result<(), ExecutionError> {
        let rows = TaskExecution::delete_for_user(&self.db.pool, execution_id, user_id).await?;
        if rows == 0 {
            return Err(ExecutionError::NotFound("execution"));
        }
        tracing::info!("deleted execution {execution_id}");
        Ok(())
    }
}

/// Project the template's stored configuration plus the caller overrides
/// into one run request. `allowed_domains` is parsed here, at the edge
/// that reads it; a malformed stored value degrades to "no restriction".
fn run_request_for(template: &TaskTemplate, overrides: &ExecutionOverrides) -> RunTaskRequest {
    RunTaskRequest {
        task: template.description.clone(),
        secrets: overrides.secrets.clone(),
        allowed_domains: template
            .allowed_domains
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok()),
        save_browser_data: overrides.save_browser_data,
        structured_output_json: template.structured_output_json.clone(),
        llm_model: template.llm_model.clone(),
        use_adblock: template.use_adblock,
        use_proxy: template.use_proxy,
        proxy_country_code: template.proxy_country_code.clone(),
        highlight_elements: template.highlight_elements,
        included_file_names: overrides.included_file_names.clone(),
        browser_viewport_width: template.browser_viewport_width,
        browser_viewport_height: template.browser_viewport_height,
        max_agent_steps: template.max_agent_steps,
        enable_public_share: template.enable_public_share,
    }
}

/// Media fetches are best-effort extras: a failure is logged and
/// downgraded to an empty list instead of failing the sync.
fn or_empty(
    result: Result<Vec<String>, BrowserPodError>,
    what: &str,
    execution_id: &str,
) -> Vec<String> {
    result.unwrap_or_else(|err| {
        tracing::warn!("failed to fetch {what} for execution {execution_id}: {err}");
        Vec::new()
    })
}
