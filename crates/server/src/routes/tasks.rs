use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    task_execution::TaskExecution,
    task_template::{CreateTaskTemplate, TaskTemplate, UpdateTaskTemplate},
};
use serde::Serialize;
use services::services::executions::ExecutionOverrides;
use utils::{
    pagination::{Page, PageQuery},
    response::ApiResponse,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::UserContext};

pub async fn get_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Page<TaskTemplate>>>, ApiError> {
    let pool = &state.db().pool;
    let query = query.normalized();
    let items =
        TaskTemplate::find_page_for_user(pool, &user.user_id, query.limit, query.offset()).await?;
    let total = TaskTemplate::count_for_user(pool, &user.user_id).await?;

    Ok(ResponseJson(ApiResponse::success(Page::new(
        items, total, query,
    ))))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    Json(payload): Json<CreateTaskTemplate>,
) -> Result<ResponseJson<ApiResponse<TaskTemplate>>, ApiError> {
    if payload.name.trim().is_empty() || payload.description.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "name and description are required".to_string(),
        ));
    }

    let template =
        TaskTemplate::create(&state.db().pool, &payload, Uuid::new_v4(), &user.user_id).await?;
    tracing::debug!("created task template '{}'", template.name);

    Ok(ResponseJson(ApiResponse::success(template)))
}

#[derive(Debug, Serialize)]
pub struct TaskTemplateWithExecutions {
    #[serde(flatten)]
    pub template: TaskTemplate,
    pub executions: Vec<TaskExecution>,
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TaskTemplateWithExecutions>>, ApiError> {
    let pool = &state.db().pool;
    let template = TaskTemplate::find_by_id_for_user(pool, task_id, &user.user_id)
        .await?
        .ok_or(ApiError::NotFound("task"))?;
    let executions = TaskExecution::find_by_task_id(pool, task_id).await?;

    Ok(ResponseJson(ApiResponse::success(
        TaskTemplateWithExecutions {
            template,
            executions,
        },
    )))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskTemplate>,
) -> Result<ResponseJson<ApiResponse<TaskTemplate>>, ApiError> {
    let pool = &state.db().pool;
    let existing = TaskTemplate::find_by_id_for_user(pool, task_id, &user.user_id)
        .await?
        .ok_or(ApiError::NotFound("task"))?;

    let template = TaskTemplate::update(pool, existing, payload).await?;
    Ok(ResponseJson(ApiResponse::success(template)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows = TaskTemplate::delete_for_user(&state.db().pool, task_id, &user.user_id).await?;
    if rows == 0 {
        return Err(ApiError::NotFound("task"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn execute_task(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<ExecutionOverrides>,
) -> Result<ResponseJson<ApiResponse<TaskExecution>>, ApiError> {
    let execution = state
        .executions()
        .create(&user.user_id, task_id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(execution)))
}

pub fn router() -> Router<AppState> {
    let task_id_router = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .route("/execute", post(execute_task));

    let inner = Router::new()
        .route("/", get(get_tasks).post(create_task))
        .nest("/{task_id}", task_id_router);

    Router::new().nest("/tasks", inner)
}
