//! Domain route groups (uploads, asset lifecycle).

use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::routing::post;
use axum::Router;
use std::sync::Arc;

pub fn upload_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/uploads", API_PREFIX),
            post(handlers::uploads::upload_single).delete(handlers::uploads::delete_upload),
        )
        .route(
            &format!("{}/uploads/batch", API_PREFIX),
            post(handlers::uploads::upload_batch),
        )
        .route(
            &format!("{}/uploads/gallery", API_PREFIX),
            post(handlers::uploads::upload_gallery),
        )
        .with_state(state)
}

pub fn asset_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/assets/replace", API_PREFIX),
            post(handlers::assets::replace_assets),
        )
        .route(
            &format!("{}/assets/release", API_PREFIX),
            post(handlers::assets::release_assets),
        )
        .with_state(state)
}
