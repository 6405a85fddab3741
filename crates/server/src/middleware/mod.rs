use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::ApiError;

/// Header set by the authenticating proxy in front of the service.
/// Session handling lives there; this layer only consumes the asserted
/// identity.
pub const USER_HEADER: &str = "x-forwarded-user";

/// Caller identity for the current request. Every operation takes it
/// explicitly; nothing below the HTTP layer reads ambient state.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: String,
}

pub async fn require_user_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = request
        .headers()
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or(ApiError::Unauthorized)?;

    request.extensions_mut().insert(UserContext { user_id });
    Ok(next.run(request).await)
}
