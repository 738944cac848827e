pub mod asset_lifecycle;
pub mod upload;

pub use asset_lifecycle::{AssetLifecycle, CleanupReport, FailedDeletion};
pub use upload::{UploadError, UploadPipeline, UploadRoute, ValidationError};
