//! Upload and single-URL delete endpoints

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use vrgallery_core::AppError;
use vrgallery_storage::StoredObject;

use crate::error::{ErrorResponse, HttpAppError};
use crate::services::upload::UploadRoute;
use crate::state::AppState;
use crate::utils::upload::read_upload_form;

/// A stored file as returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    /// Persist this value; it is what later delete and replace calls expect.
    pub url: String,
    pub key: String,
    pub size_bytes: u64,
    pub content_type: String,
}

impl From<StoredObject> for UploadResponse {
    fn from(object: StoredObject) -> Self {
        UploadResponse {
            url: object.url,
            key: object.key,
            size_bytes: object.size_bytes,
            content_type: object.content_type,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchUploadResponse {
    /// Same order as the parts in the request.
    pub files: Vec<UploadResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GalleryUploadResponse {
    /// Stored files grouped by form field, each group in request order.
    pub fields: BTreeMap<String, Vec<UploadResponse>>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteQuery {
    /// URL previously returned by an upload endpoint (a bare key is accepted too).
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    /// `false` when nothing was stored at that location.
    pub deleted: bool,
}

async fn store_form(
    state: &AppState,
    route: &UploadRoute,
    multipart: Multipart,
) -> Result<Vec<(String, UploadResponse)>, HttpAppError> {
    let form = read_upload_form(multipart, route).await?;
    let fields: Vec<String> = form.files.iter().map(|f| f.field_name.clone()).collect();

    let stored = state
        .uploads
        .pipeline
        .store_files(route, form.files, form.folder.as_deref())
        .await?;

    Ok(fields
        .into_iter()
        .zip(stored.into_iter().map(UploadResponse::from))
        .collect())
}

/// Upload a single image
///
/// Multipart field `file`, optional text field `folder` (default `artists`).
#[utoipa::path(
    post,
    path = "/api/v0/uploads",
    tag = "uploads",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Not an image", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_single"))]
pub async fn upload_single(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), HttpAppError> {
    let mut stored = store_form(&state, &state.uploads.single, multipart).await?;
    let (_, file) = stored.pop().ok_or_else(|| {
        HttpAppError(AppError::Internal("Upload returned no stored file".to_string()))
    })?;
    Ok((StatusCode::CREATED, Json(file)))
}

/// Upload several work images at once
#[utoipa::path(
    post,
    path = "/api/v0/uploads/batch",
    tag = "uploads",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Images stored, in request order", body = BatchUploadResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "Upload too large", body = ErrorResponse),
        (status = 415, description = "Not an image", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_batch"))]
pub async fn upload_batch(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BatchUploadResponse>), HttpAppError> {
    let stored = store_form(&state, &state.uploads.work_images, multipart).await?;
    let files = stored.into_iter().map(|(_, file)| file).collect();
    Ok((StatusCode::CREATED, Json(BatchUploadResponse { files })))
}

/// Upload an artist profile image together with work images
#[utoipa::path(
    post,
    path = "/api/v0/uploads/gallery",
    tag = "uploads",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Images stored", body = GalleryUploadResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "Upload too large", body = ErrorResponse),
        (status = 415, description = "Not an image", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_gallery"))]
pub async fn upload_gallery(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<GalleryUploadResponse>), HttpAppError> {
    let stored = store_form(&state, &state.uploads.gallery, multipart).await?;

    let mut fields: BTreeMap<String, Vec<UploadResponse>> = BTreeMap::new();
    for (field, file) in stored {
        fields.entry(field).or_default().push(file);
    }
    Ok((StatusCode::CREATED, Json(GalleryUploadResponse { fields })))
}

/// Delete a previously uploaded file by URL
///
/// Idempotent: a second call for the same URL returns `deleted: false`.
#[utoipa::path(
    delete,
    path = "/api/v0/uploads",
    tag = "uploads",
    params(DeleteQuery),
    responses(
        (status = 200, description = "Delete attempted", body = DeleteResponse),
        (status = 400, description = "Invalid URL", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "delete_upload"))]
pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>, HttpAppError> {
    if query.url.trim().is_empty() {
        return Err(AppError::InvalidInput("url must not be empty".to_string()).into());
    }
    let outcome = state.lifecycle.delete_by_url(&query.url).await?;
    Ok(Json(DeleteResponse {
        deleted: outcome.is_deleted(),
    }))
}
