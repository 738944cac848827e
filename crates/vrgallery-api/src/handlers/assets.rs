//! Reference-change endpoints for entities holding asset URLs

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::services::CleanupReport;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplaceAssetsRequest {
    /// URLs the entity held before the update.
    #[serde(default)]
    pub previous: Vec<String>,
    /// URLs the entity holds after the update.
    #[serde(default)]
    pub next: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReleaseAssetsRequest {
    /// Every URL held by the deleted entity.
    pub urls: Vec<String>,
}

/// Delete assets dropped by an entity update
///
/// Deletes every URL in `previous` that is absent from `next`. Backend failures are
/// reported per URL and never fail the request.
#[utoipa::path(
    post,
    path = "/api/v0/assets/replace",
    tag = "assets",
    request_body = ReplaceAssetsRequest,
    responses(
        (status = 200, description = "Cleanup attempted", body = CleanupReport),
        (status = 400, description = "Invalid request body", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(
        previous = request.previous.len(),
        next = request.next.len(),
        operation = "replace_assets"
    )
)]
pub async fn replace_assets(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ReplaceAssetsRequest>,
) -> Result<Json<CleanupReport>, HttpAppError> {
    let report = match (request.previous.as_slice(), request.next.as_slice()) {
        ([old], [] | [_]) => {
            state
                .lifecycle
                .on_replace(Some(old.as_str()), request.next.first().map(String::as_str))
                .await
        }
        (previous, next) => state.lifecycle.on_replace_many(previous, next).await,
    };
    Ok(Json(report))
}

/// Delete every asset of a deleted entity
#[utoipa::path(
    post,
    path = "/api/v0/assets/release",
    tag = "assets",
    request_body = ReleaseAssetsRequest,
    responses(
        (status = 200, description = "Cleanup attempted", body = CleanupReport),
        (status = 400, description = "Invalid request body", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(urls = request.urls.len(), operation = "release_assets"))]
pub async fn release_assets(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ReleaseAssetsRequest>,
) -> Result<Json<CleanupReport>, HttpAppError> {
    let report = state.lifecycle.on_entity_deleted(&request.urls).await;
    Ok(Json(report))
}
