use std::{env, sync::Arc};

use db::DBService;
use server::{AppState, routes};
use services::services::browser_pod::BrowserPodClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let db = DBService::new().await?;

    let pod_url =
        env::var("BROWSER_POD_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    let state = AppState::new(db, Arc::new(BrowserPodClient::new(&pod_url)));

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}, browser-pod at {pod_url}");
    axum::serve(listener, routes::router(state)).await?;

    Ok(())
}
