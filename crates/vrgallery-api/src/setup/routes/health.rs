//! Health check handlers and response types.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct HealthCheckResponse {
    /// `healthy` or `unhealthy`
    pub status: String,
    /// Backend receiving writes: `s3`, `vps` or `local`.
    pub backend: String,
    pub ready: bool,
}

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Storage readiness
///
/// Reports the selected backend and whether it currently answers. A probe that does
/// not finish within the storage timeout counts as not ready.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Storage backend ready", body = HealthCheckResponse),
        (status = 503, description = "Storage backend not ready", body = HealthCheckResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let storage = state.storage().clone();
    let timeout: Duration = state.config.storage.timeout;

    let ready = match tokio::time::timeout(timeout, storage.is_ready()).await {
        Ok(ready) => ready,
        Err(_) => {
            tracing::error!(backend = %storage.backend_type(), "Storage readiness check timed out");
            false
        }
    };

    if !ready {
        tracing::warn!(backend = %storage.backend_type(), "Storage backend not ready");
    }

    let response = HealthCheckResponse {
        status: if ready { "healthy" } else { "unhealthy" }.to_string(),
        backend: storage.backend_type().to_string(),
        ready,
    };

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
