//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Storage operation errors
///
/// "Not found" is deliberately absent: deleting a missing object is a normal
/// [`DeleteOutcome::NotFound`], never an error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend refused or failed a write.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Storage operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A persisted object as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    /// Backend-relative path, unique within the backend.
    pub key: String,
    /// Externally resolvable address; `key_for_url(url)` yields `key` again.
    pub url: String,
    pub size_bytes: u64,
    pub content_type: String,
}

/// Result of a delete that reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

impl DeleteOutcome {
    pub fn is_deleted(self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

/// A directory a disk backend wants served as static files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticMount {
    /// Path segment without slashes, e.g. `uploads`.
    pub url_prefix: String,
    pub root: PathBuf,
}

/// Storage abstraction trait
///
/// All storage backends (local disk, VPS path, S3) implement this trait. The
/// selected backend is held as `Arc<dyn Storage>` and injected everywhere, so no
/// caller ever branches on the concrete backend.
///
/// **Key format:** `{folder}/{unix_millis}-{sanitized_name}{ext}`; see the `keys` module.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist `data` under `folder` (default folder when `None`).
    ///
    /// Fails with [`StorageError::WriteFailed`] on I/O or network failure.
    async fn store(
        &self,
        folder: Option<&str>,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject>;

    /// Delete the object addressed by a URL issued by this backend, or by a bare key.
    ///
    /// Idempotent: a second call for the same object returns `NotFound`.
    async fn delete(&self, url_or_key: &str) -> StorageResult<DeleteOutcome>;

    /// Public URL for a key. Pure, no I/O.
    fn url_for(&self, key: &str) -> String;

    /// Inverse of [`Storage::url_for`]. `None` when the URL was not issued by this backend.
    ///
    /// Strings without a scheme are treated as keys and returned unchanged.
    fn key_for_url(&self, url_or_key: &str) -> Option<String>;

    /// Cheap liveness probe (directory exists / bucket reachable).
    async fn is_ready(&self) -> bool;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Directory to serve over HTTP, for backends whose URLs point back at this process.
    fn static_mount(&self) -> Option<StaticMount> {
        None
    }
}

/// `true` when the string looks like an absolute URL rather than a storage key.
pub(crate) fn is_url(url_or_key: &str) -> bool {
    url_or_key.starts_with("http://") || url_or_key.starts_with("https://")
}

/// Drop any query string or fragment from a URL.
pub(crate) fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}
