//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use crate::services::asset_lifecycle;
use crate::setup::routes::health;

/// The OpenAPI document served at `/api/openapi.json`.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "VR Gallery Asset API",
        version = "0.1.0",
        description = "Image upload and asset lifecycle API for the VR gallery. Stored files are served from S3, a VPS path, or local disk, whichever backend was selected at start-up. All endpoints except health are versioned under /api/v0/."
    ),
    paths(
        // Uploads
        handlers::uploads::upload_single,
        handlers::uploads::upload_batch,
        handlers::uploads::upload_gallery,
        handlers::uploads::delete_upload,
        // Asset lifecycle
        handlers::assets::replace_assets,
        handlers::assets::release_assets,
        // Health
        health::health_check,
    ),
    components(
        schemas(
            handlers::uploads::UploadResponse,
            handlers::uploads::BatchUploadResponse,
            handlers::uploads::GalleryUploadResponse,
            handlers::uploads::DeleteResponse,
            handlers::assets::ReplaceAssetsRequest,
            handlers::assets::ReleaseAssetsRequest,
            asset_lifecycle::CleanupReport,
            asset_lifecycle::FailedDeletion,
            health::HealthCheckResponse,
            // Error
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "uploads", description = "Image uploads and single-URL deletes"),
        (name = "assets", description = "Cleanup of assets dropped by entity updates and deletes"),
        (name = "health", description = "Storage backend readiness")
    )
)]
pub struct ApiDoc;
