use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::task_execution::{ExecutionWithTemplate, TaskExecution};
use serde::Deserialize;
use utils::{
    pagination::{Page, PageQuery},
    response::ApiResponse,
};

use crate::{AppState, error::ApiError, middleware::UserContext};

pub async fn get_executions(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Page<ExecutionWithTemplate>>>, ApiError> {
    let pool = &state.db().pool;
    let query = query.normalized();
    let items =
        TaskExecution::find_page_for_user(pool, &user.user_id, query.limit, query.offset()).await?;
    let total = TaskExecution::count_for_user(pool, &user.user_id).await?;

    Ok(ResponseJson(ApiResponse::success(Page::new(
        items, total, query,
    ))))
}

pub async fn get_execution(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    Path(execution_id): Path<String>,
) -> Result<ResponseJson<ApiResponse<ExecutionWithTemplate>>, ApiError> {
    let execution = TaskExecution::find_with_template_by_id_for_user(
        &state.db().pool,
        &execution_id,
        &user.user_id,
    )
    .await?
    .ok_or(ApiError::NotFound("execution"))?;

    Ok(ResponseJson(ApiResponse::success(execution)))
}

pub async fn delete_execution(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    Path(execution_id): Path<String>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state
        .executions()
        .delete(&user.user_id, &execution_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    pub action: String,
}

pub async fn control_execution(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    Path(execution_id): Path<String>,
    Json(payload): Json<ControlRequest>,
) -> Result<ResponseJson<ApiResponse<TaskExecution>>, ApiError> {
    let execution = state
        .executions()
        .control(&user.user_id, &execution_id, &payload.action)
        .await?;
    Ok(ResponseJson(ApiResponse::success(execution)))
}

pub async fn sync_execution(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    Path(execution_id): Path<String>,
) -> Result<ResponseJson<ApiResponse<TaskExecution>>, ApiError> {
    let execution = state
        .executions()
        .sync(&user.user_id, &execution_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(execution)))
}

pub fn router() -> Router<AppState> {
    let execution_id_router = Router::new()
        .route("/", get(get_execution).delete(delete_execution))
        .route("/control", post(control_execution))
        .route("/sync", post(sync_execution));

    let inner = Router::new()
        .route("/", get(get_executions))
        .nest("/{execution_id}", execution_id_router);

    Router::new().nest("/executions", inner)
}
