//! Application state shared by every handler.

use std::sync::Arc;

use vrgallery_core::Config;
use vrgallery_storage::{Storage, StorageSelection};

use crate::services::upload::{UploadPipeline, UploadRoute};
use crate::services::AssetLifecycle;

/// The selected backend and the upload routes built from configuration.
#[derive(Clone)]
pub struct UploadState {
    pub pipeline: UploadPipeline,
    pub single: UploadRoute,
    pub work_images: UploadRoute,
    pub gallery: UploadRoute,
}

/// Main application state: aggregates sub-states for dependency injection.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub selection: StorageSelection,
    pub uploads: UploadState,
    pub lifecycle: AssetLifecycle,
}

impl AppState {
    pub fn new(config: Config, selection: StorageSelection) -> Self {
        let timeout = config.storage.timeout;
        let limits = &config.uploads;

        let uploads = UploadState {
            pipeline: UploadPipeline::new(
                selection.primary.clone(),
                limits.default_folder.clone(),
                timeout,
            ),
            single: UploadRoute::single(limits),
            work_images: UploadRoute::work_images(limits),
            gallery: UploadRoute::gallery(limits),
        };
        let lifecycle = AssetLifecycle::new(selection.clone(), timeout);

        AppState {
            config,
            selection,
            uploads,
            lifecycle,
        }
    }

    /// Backend receiving new writes.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.selection.primary
    }

    /// Largest total body any upload route accepts.
    pub fn max_upload_bytes(&self) -> usize {
        [&self.uploads.single, &self.uploads.work_images, &self.uploads.gallery]
            .iter()
            .map(|route| route.max_total_bytes)
            .max()
            .unwrap_or_default()
    }
}
