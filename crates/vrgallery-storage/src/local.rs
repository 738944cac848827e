use crate::keys::{generate_storage_key, validate_key};
use crate::traits::{
    is_url, strip_query, DeleteOutcome, StaticMount, Storage, StorageError, StorageResult,
    StoredObject,
};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use vrgallery_core::constants::{LOCAL_URL_PREFIX, VPS_URL_PREFIX};

/// Filesystem storage implementation
///
/// Serves both the local backend (`<cwd>/uploads`, URLs under `/uploads`) and the
/// VPS backend (an operator directory, URLs under `/storage`). The two differ only
/// in root, URL prefix and reported backend type.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    url_prefix: String,
    backend: StorageBackend,
}

impl LocalStorage {
    /// Create a local-disk backend.
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/srv/app/uploads")
    /// * `public_base_url` - Scheme and host clients reach this process on (e.g., "http://localhost:3000")
    pub async fn new(base_path: impl Into<PathBuf>, public_base_url: &str) -> StorageResult<Self> {
        Self::open(
            base_path.into(),
            public_base_url,
            LOCAL_URL_PREFIX,
            StorageBackend::Local,
        )
        .await
    }

    /// Create a VPS-path backend rooted at an operator-provided directory.
    pub async fn vps(base_path: impl Into<PathBuf>, public_base_url: &str) -> StorageResult<Self> {
        Self::open(
            base_path.into(),
            public_base_url,
            VPS_URL_PREFIX,
            StorageBackend::Vps,
        )
        .await
    }

    async fn open(
        base_path: PathBuf,
        public_base_url: &str,
        url_prefix: &str,
        backend: StorageBackend,
    ) -> StorageResult<Self> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url: public_base_url.trim_end_matches('/').to_string(),
            url_prefix: url_prefix.trim_matches('/').to_string(),
            backend,
        })
    }

    /// Handle for a root that may not exist yet; nothing is created.
    ///
    /// Used for resolving URLs of a backend that is no longer the write target.
    pub fn resolver_only(
        base_path: impl Into<PathBuf>,
        public_base_url: &str,
        backend: StorageBackend,
    ) -> Self {
        let url_prefix = match backend {
            StorageBackend::Vps => VPS_URL_PREFIX,
            _ => LOCAL_URL_PREFIX,
        };
        LocalStorage {
            base_path: base_path.into(),
            base_url: public_base_url.trim_end_matches('/').to_string(),
            url_prefix: url_prefix.to_string(),
            backend,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Create and remove a probe file under the root.
    ///
    /// Stronger than [`Storage::is_ready`]; run once when the backend is selected.
    pub async fn probe_writable(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let probe = self.base_path.join(format!(".write-probe-{}", Uuid::new_v4()));
        fs::write(&probe, b"ok").await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Storage directory {} is not writable: {}",
                self.base_path.display(),
                e
            ))
        })?;
        fs::remove_file(&probe).await?;
        Ok(())
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys with traversal sequences and keys whose deepest existing
    /// ancestor resolves (through symlinks) outside the base directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;

        let path = self.base_path.join(storage_key);

        // Root removed underneath us: nothing on disk to escape through.
        let Ok(base_canonical) = self.base_path.canonicalize() else {
            return Ok(path);
        };

        let mut existing = path.as_path();
        while !existing.exists() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }

        if let Ok(canonical) = existing.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    async fn write_atomically(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let parent = path.parent().unwrap_or(&self.base_path);
        fs::create_dir_all(parent).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;

        let tmp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        let result = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp_path, path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::WriteFailed(format!(
                "Failed to write file {}: {}",
                path.display(),
                e
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn store(
        &self,
        folder: Option<&str>,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject> {
        let key = generate_storage_key(folder, file_name)?;
        let path = self.key_to_path(&key)?;
        let size = data.len();

        let start = std::time::Instant::now();
        self.write_atomically(&path, &data).await?;

        let url = self.url_for(&key);

        tracing::info!(
            backend = %self.backend,
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Disk storage write successful"
        );

        Ok(StoredObject {
            key,
            url,
            size_bytes: size as u64,
            content_type: content_type.to_string(),
        })
    }

    async fn delete(&self, url_or_key: &str) -> StorageResult<DeleteOutcome> {
        let key = self.key_for_url(url_or_key).ok_or_else(|| {
            StorageError::InvalidKey(format!("URL not issued by this backend: {}", url_or_key))
        })?;
        let path = self.key_to_path(&key)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(
                    backend = %self.backend,
                    path = %path.display(),
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Disk storage delete successful"
                );
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(key = %key, "Disk storage delete: object not found");
                Ok(DeleteOutcome::NotFound)
            }
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.url_prefix, key)
    }

    fn key_for_url(&self, url_or_key: &str) -> Option<String> {
        let trimmed = strip_query(url_or_key.trim());

        // Match on the path only: URLs issued under an older PUBLIC_BASE_URL still resolve.
        let path = if is_url(trimmed) {
            let after_scheme = trimmed.split_once("://").map(|(_, rest)| rest)?;
            &after_scheme[after_scheme.find('/')?..]
        } else if trimmed.starts_with('/') {
            trimmed
        } else {
            return Some(trimmed.to_string());
        };

        let marker = format!("/{}/", self.url_prefix);
        let encoded_key = path.strip_prefix(marker.as_str())?;
        let key = urlencoding::decode(encoded_key).ok()?.into_owned();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    async fn is_ready(&self) -> bool {
        fs::metadata(&self.base_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }

    fn static_mount(&self) -> Option<StaticMount> {
        Some(StaticMount {
            url_prefix: self.url_prefix.clone(),
            root: self.base_path.clone(),
        })
    }
}
