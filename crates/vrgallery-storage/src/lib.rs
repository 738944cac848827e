//! vrgallery storage library
//!
//! Storage abstraction for gallery assets (artist portraits, work images, staff
//! photos) and its backends: local disk, an operator-provided VPS path, and an S3
//! bucket. Exactly one backend takes writes per process; see [`select_storage`].
//!
//! # Storage key format
//!
//! All backends use the same key layout: `{folder}/{unix_millis}-{sanitized_name}{ext}`,
//! e.g. `artists/1718000000000-portrait.jpg`. The folder defaults to `artists`.
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

#[cfg(feature = "storage-s3")]
pub mod bucket;
pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_storage, select_storage, StorageSelection};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{
    DeleteOutcome, StaticMount, Storage, StorageError, StorageResult, StoredObject,
};
pub use vrgallery_core::StorageBackend;
