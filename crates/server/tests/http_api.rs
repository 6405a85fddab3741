use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use db::DBService;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use server::{AppState, routes};
use services::services::browser_pod::{BrowserPod, BrowserPodError, RemoteTask, RunTaskRequest};
use tower::ServiceExt;

/// In-process stand-in for browser-pod: hands out sequential job ids and
/// reports every job as finished with a fixed payload.
#[derive(Default)]
struct FakePod {
    submitted: Mutex<Vec<RunTaskRequest>>,
}

#[async_trait::async_trait]
impl BrowserPod for FakePod {
    async fn run_task(&self, request: &RunTaskRequest) -> Result<String, BrowserPodError> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(request.clone());
        Ok(format!("job-{}", submitted.len()))
    }

    async fn get_task(&self, task_id: &str) -> Result<RemoteTask, BrowserPodError> {
        Ok(RemoteTask {
            id: task_id.to_string(),
            status: db::models::task_execution::ExecutionStatus::Finished,
            output: Some("done".to_string()),
            live_url: None,
            public_share_url: None,
            output_files: None,
            steps: Some(json!([{"step": 1, "next_goal": "open the page"}])),
            browser_data: None,
            finished_at: Some(Utc::now()),
        })
    }

    async fn get_screenshots(&self, _task_id: &str) -> Result<Vec<String>, BrowserPodError> {
        Ok(vec!["shot-1.png".to_string()])
    }

    async fn get_media(&self, _task_id: &str) -> Result<Vec<String>, BrowserPodError> {
        Ok(Vec::new())
    }

    async fn stop_task(&self, _task_id: &str) -> Result<(), BrowserPodError> {
        Ok(())
    }

    async fn pause_task(&self, _task_id: &str) -> Result<(), BrowserPodError> {
        Ok(())
    }

    async fn resume_task(&self, _task_id: &str) -> Result<(), BrowserPodError> {
        Ok(())
    }
}

async fn app() -> (Router, Arc<FakePod>) {
    let db = DBService::connect("sqlite::memory:").await.unwrap();
    let pod = Arc::new(FakePod::default());
    (routes::router(AppState::new(db, pod.clone())), pod)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-forwarded-user", user);
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_does_not_require_identity() {
    let (app, _pod) = app().await;
    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn missing_identity_header_is_unauthorized() {
    let (app, _pod) = app().await;
    let (status, body) = send(&app, Method::GET, "/api/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn template_lifecycle_and_execution_flow() {
    let (app, pod) = app().await;
    let alice = Some("alice@example.com");

    // Create a template and read it back from the list.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/tasks",
        alice,
        Some(json!({
            "name": "daily check",
            "description": "Open the status page and read the banner",
            "allowed_domains": ["status.example.com"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let task_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, "/api/tasks", alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["items"][0]["name"], json!("daily check"));

    // Start a run; the record is keyed by the pod-assigned job id.
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/tasks/{task_id}/execute"),
        alice,
        Some(json!({"save_browser_data": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], json!("job-1"));
    assert_eq!(body["data"]["status"], json!("created"));

    let submitted = pod.submitted.lock().unwrap().clone();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].task, "Open the status page and read the banner");
    assert!(submitted[0].save_browser_data);

    // An unknown action is rejected before browser-pod is involved.
    let (status, _body) = send(
        &app,
        Method::POST,
        "/api/executions/job-1/control",
        alice,
        Some(json!({"action": "restart"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/executions/job-1/control",
        alice,
        Some(json!({"action": "stop"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("stopped"));

    // Sync mirrors the remote payload, media included.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/executions/job-1/sync",
        alice,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("finished"));
    assert_eq!(body["data"]["output"], json!("done"));
    assert_eq!(body["data"]["screenshots"], json!(r#"["shot-1.png"]"#));
    assert!(body["data"]["finished_at"].is_string());

    // The list view joins the originating template.
    let (status, body) = send(&app, Method::GET, "/api/executions", alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["task_name"], json!("daily check"));

    let (status, _body) = send(
        &app,
        Method::DELETE,
        "/api/executions/job-1",
        alice,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _body) = send(&app, Method::GET, "/api/executions/job-1", alice, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn records_are_invisible_to_other_users() {
    let (app, _pod) = app().await;

    let (_status, body) = send(
        &app,
        Method::POST,
        "/api/tasks",
        Some("alice@example.com"),
        Some(json!({
            "name": "private",
            "description": "Fetch the internal dashboard",
        })),
    )
    .await;
    let task_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _body) = send(
        &app,
        Method::GET,
        &format!("/api/tasks/{task_id}"),
        Some("bob@example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _body) = send(
        &app,
        Method::DELETE,
        &format!("/api/tasks/{task_id}"),
        Some("bob@example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
