pub mod handlers;
pub mod types;
pub mod websocket;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::monitor::MonitorHandle;

#[derive(Clone)]
pub struct AppState {
    pub monitor: MonitorHandle,
}

pub fn router(monitor: MonitorHandle) -> Router {
    let state = Arc::new(AppState { monitor });

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/status", get(handlers::status))
        .route("/api/v1/analysis", get(handlers::analysis))
        .route("/api/v1/alerts", get(handlers::alerts))
        .route("/ws", get(websocket::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(monitor: MonitorHandle, host: &str, port: u16) -> eyre::Result<()> {
    let app = router(monitor);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
