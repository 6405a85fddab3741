use axum::{Router, middleware::from_fn, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{AppState, middleware::require_user_middleware};

pub mod executions;
pub mod health;
pub mod tasks;

pub fn router(state: AppState) -> Router {
    // Everything except the health probe sits behind the identity check.
    let authed_routes = Router::new()
        .merge(tasks::router())
        .merge(executions::router())
        .layer(from_fn(require_user_middleware));

    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .merge(authed_routes)
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
