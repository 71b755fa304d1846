// Read-only operational surface: overall health, per-component sync
// status, and queue depth. Nothing here mutates pipeline state.

use crate::{
    api::{error::ApiError, response::ApiResponse},
    health::HealthStatus,
    queue::store,
    state::AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sync", get(sync_status))
        .route("/queue", get(queue_stats))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Response {
    let report = state.health.check().await;

    let code = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (code, Json(report)).into_response()
}

// GET /sync
async fn sync_status(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let records = state.db.list_sync_status().await?;
    Ok(ApiResponse { data: records }.into_response())
}

// GET /queue
async fn queue_stats(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let stats = store::counts_by_status(&state.db_pool).await?;
    Ok(ApiResponse { data: stats }.into_response())
}
