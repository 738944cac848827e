//! Upload pipeline: route contracts, validation and storage hand-off.

pub mod service;
pub mod types;

pub use service::{validate_files, UploadPipeline};
pub use types::{
    normalize_mime_type, FieldSpec, IncomingFile, UploadError, UploadRoute, UploadSelector,
    ValidationError, PROFILE_IMAGE_FIELD, SINGLE_FILE_FIELD, WORK_IMAGES_FIELD,
};
