use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::models::task_execution::ExecutionStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserPodError {
    #[error("browser-pod request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("browser-pod returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Run request accepted by browser-pod's POST /api/v1/run-task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTaskRequest {
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_domains: Option<Vec<String>>,
    pub save_browser_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_output_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    pub use_adblock: bool,
    pub use_proxy: bool,
    pub proxy_country_code: String,
    pub highlight_elements: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_file_names: Option<Vec<String>>,
    pub browser_viewport_width: i64,
    pub browser_viewport_height: i64,
    pub max_agent_steps: i64,
    pub enable_public_share: bool,
}

/// Job state from GET /api/v1/task/{id}. Steps, browser data and output
/// files are opaque here; only the edges that render them care about
/// their shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub live_url: Option<String>,
    #[serde(default)]
    pub public_share_url: Option<String>,
    #[serde(default)]
    pub output_files: Option<Value>,
    #[serde(default)]
    pub steps: Option<Value>,
    #[serde(default)]
    pub browser_data: Option<Value>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TaskCreatedResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TaskScreenshotsResponse {
    screenshots: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TaskMediaResponse {
    recordings: Option<Vec<String>>,
}

/// The seam between the synchronizer and the automation backend. One
/// method per remote endpoint; only the control commands collapse the
/// response to success/failure.
#[async_trait]
pub trait BrowserPod: Send + Sync {
    async fn run_task(&self, request: &RunTaskRequest) -> Result<String, BrowserPodError>;
    async fn get_task(&self, task_id: &str) -> Result<RemoteTask, BrowserPodError>;
    async fn get_screenshots(&self, task_id: &str) -> Result<Vec<String>, BrowserPodError>;
    async fn get_media(&self, task_id: &str) -> Result<Vec<String>, BrowserPodError>;
    async fn stop_task(&self, task_id: &str) -> Result<(), BrowserPodError>;
    async fn pause_task(&self, task_id: &str) -> Result<(), BrowserPodError>;
    async fn resume_task(&self, task_id: &str) -> Result<(), BrowserPodError>;
}

#[derive(Debug, Clone)]
pub struct BrowserPodClient {
    client: reqwest::Client,
    base_url: String,
}

impl BrowserPodClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, BrowserPodError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let message = Self::error_message(resp).await;
        Err(BrowserPodError::Api { status, message })
    }

    /// browser-pod reports errors as `{"detail": ...}`; fall back to the
    /// raw body when it isn't.
    async fn error_message(resp: reqwest::Response) -> String {
        #[derive(Deserialize)]
        struct ErrorBody {
            detail: Value,
        }

        let Ok(body) = resp.text().await else {
            return String::new();
        };
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => match parsed.detail {
                Value::String(message) => message,
                other => other.to_string(),
            },
            Err(_) => body,
        }
    }
}

#[async_trait]
impl BrowserPod for BrowserPodClient {
    async fn run_task(&self, request: &RunTaskRequest) -> Result<String, BrowserPodError> {
        let resp = self
            .client
            .post(self.url("/api/v1/run-task"))
            .json(request)
            .send()
            .await?;
        let created: TaskCreatedResponse = Self::check(resp).await?.json().await?;
        Ok(created.id)
    }

    async fn get_task(&self, task_id: &str) -> Result<RemoteTask, BrowserPodError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/v1/task/{task_id}")))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn get_screenshots(&self, task_id: &str) -> Result<Vec<String>, BrowserPodError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/v1/task/{task_id}/screenshots")))
            .send()
            .await?;
        let body: TaskScreenshotsResponse = Self::check(resp).await?.json().await?;
        Ok(body.screenshots.unwrap_or_default())
    }

    async fn get_media(&self, task_id: &str) -> Result<Vec<String>, BrowserPodError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/v1/task/{task_id}/media")))
            .send()
            .await?;
        let body: TaskMediaResponse = Self::check(resp).await?.json().await?;
        Ok(body.recordings.unwrap_or_default())
    }

    async fn stop_task(&self, task_id: &str) -> Result<(), BrowserPodError> {
        let resp = self
            .client
            .put(self.url("/api/v1/stop-task"))
            .query(&[("task_id", task_id)])
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn pause_task(&self, task_id: &str) -> Result<(), BrowserPodError> {
        let resp = self
            .client
            .put(self.url("/api/v1/pause-task"))
            .query(&[("task_id", task_id)])
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn resume_task(&self, task_id: &str) -> Result<(), BrowserPodError> {
        let resp = self
            .client
            .put(self.url("/api/v1/resume-task"))
            .query(&[("task_id", task_id)])
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}
