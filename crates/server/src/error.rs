use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::executions::ExecutionError;
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Execution(err) => match err {
                ExecutionError::NotFound(_) => StatusCode::NOT_FOUND,
                ExecutionError::Validation(_) => StatusCode::BAD_REQUEST,
                ExecutionError::ExternalService(_) => StatusCode::BAD_GATEWAY,
                ExecutionError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!("request failed: {message}");
        }
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}
