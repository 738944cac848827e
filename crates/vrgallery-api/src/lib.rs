//! VR Gallery API Library
//!
//! This crate provides the HTTP handlers, the upload pipeline, the asset lifecycle
//! manager and application setup on top of `vrgallery-storage`.

// Module declarations
mod api_doc;
mod handlers;
mod telemetry;
mod utils;

// Public modules
pub mod constants;
pub mod error;
pub mod services;
pub mod setup;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use services::{AssetLifecycle, CleanupReport, UploadPipeline};
pub use state::AppState;
