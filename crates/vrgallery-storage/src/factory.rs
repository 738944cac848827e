#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::traits::is_url;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use vrgallery_core::Config;

/// The backend chosen at start-up plus the handles able to resolve older URLs.
#[derive(Clone)]
pub struct StorageSelection {
    /// Receives every new write.
    pub primary: Arc<dyn Storage>,
    /// `primary` first, then the configured bucket and other disk backends whose roots exist.
    pub resolvers: Vec<Arc<dyn Storage>>,
}

impl StorageSelection {
    /// A selection with a single backend that also resolves its own URLs.
    pub fn single(primary: Arc<dyn Storage>) -> Self {
        StorageSelection {
            resolvers: vec![primary.clone()],
            primary,
        }
    }

    /// Find the backend that issued `url_or_key` and the key it maps to.
    ///
    /// Bare keys always belong to the primary backend.
    pub fn resolve(&self, url_or_key: &str) -> Option<(Arc<dyn Storage>, String)> {
        let trimmed = url_or_key.trim();
        if !is_url(trimmed) && !trimmed.starts_with('/') {
            return self
                .primary
                .key_for_url(trimmed)
                .map(|key| (self.primary.clone(), key));
        }

        self.resolvers.iter().find_map(|storage| {
            storage
                .key_for_url(trimmed)
                .map(|key| (storage.clone(), key))
        })
    }
}

/// Select the storage backend for this process.
///
/// Candidates are tried in [`vrgallery_core::StorageConfig::candidate_order`]; a
/// candidate that cannot be used is logged at WARN and the next one is tried. Fails
/// only when no candidate is usable.
pub async fn select_storage(config: &Config) -> StorageResult<StorageSelection> {
    let mut failures = Vec::new();

    for backend in config.storage.candidate_order() {
        match create_storage(backend, config).await {
            Ok(primary) => {
                tracing::info!(
                    backend = %backend,
                    skipped = failures.len(),
                    "Storage backend selected"
                );
                let resolvers = build_resolvers(primary.clone(), config);
                return Ok(StorageSelection { primary, resolvers });
            }
            Err(e) => {
                tracing::warn!(
                    backend = %backend,
                    error = %e,
                    "Storage backend unavailable, trying next candidate"
                );
                failures.push(format!("{}: {}", backend, e));
            }
        }
    }

    Err(StorageError::ConfigError(format!(
        "No storage backend available ({})",
        failures.join("; ")
    )))
}

/// Create a storage backend of the given kind and verify it is usable.
pub async fn create_storage(
    backend: StorageBackend,
    config: &Config,
) -> StorageResult<Arc<dyn Storage>> {
    let timeout = config.storage.timeout;

    match backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            if !config.storage.has_s3_credentials() {
                return Err(StorageError::ConfigError(
                    "AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY not configured".to_string(),
                ));
            }

            if config.storage.s3_bootstrap_bucket {
                tokio::time::timeout(timeout, crate::bucket::ensure_bucket(&config.storage))
                    .await
                    .map_err(|_| StorageError::Timeout(timeout))??;
            }

            let storage = S3Storage::new(&config.storage)?;
            let ready = tokio::time::timeout(timeout, storage.is_ready())
                .await
                .unwrap_or(false);
            if !ready {
                return Err(StorageError::BackendError(format!(
                    "Bucket {} is not reachable",
                    storage.bucket()
                )));
            }
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Vps => {
            let path = config.storage.vps_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("VPS_STORAGE_PATH not configured".to_string())
            })?;
            let storage = LocalStorage::vps(path, config.public_base_url()).await?;
            probe(&storage, timeout).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let storage = LocalStorage::new(
                config.storage.local_storage_path.clone(),
                config.public_base_url(),
            )
            .await?;
            probe(&storage, timeout).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Vps | StorageBackend::Local => Err(StorageError::ConfigError(
            "Disk storage backends not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

#[cfg(feature = "storage-local")]
async fn probe(storage: &LocalStorage, timeout: std::time::Duration) -> StorageResult<()> {
    tokio::time::timeout(timeout, storage.probe_writable())
        .await
        .map_err(|_| StorageError::Timeout(timeout))?
}

/// Handles for every backend that may have issued URLs still held by entities.
///
/// The bucket is registered whenever credentials exist, reachable or not, so its URLs
/// are deleted against S3 (or fail there) instead of being reported as unknown.
fn build_resolvers(primary: Arc<dyn Storage>, config: &Config) -> Vec<Arc<dyn Storage>> {
    #[cfg_attr(
        not(any(feature = "storage-s3", feature = "storage-local")),
        allow(unused_mut)
    )]
    let mut resolvers = vec![primary.clone()];

    #[cfg(feature = "storage-s3")]
    {
        if primary.backend_type() != StorageBackend::S3 && config.storage.has_s3_credentials() {
            match S3Storage::new(&config.storage) {
                Ok(storage) => {
                    tracing::debug!(bucket = %storage.bucket(), "Registering URL resolver");
                    resolvers.push(Arc::new(storage));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "S3 URL resolver unavailable");
                }
            }
        }
    }

    #[cfg(feature = "storage-local")]
    {
        let disk_roots = [
            (StorageBackend::Vps, config.storage.vps_storage_path.clone()),
            (
                StorageBackend::Local,
                Some(config.storage.local_storage_path.clone()),
            ),
        ];
        for (backend, root) in disk_roots {
            let Some(root) = root else { continue };
            if backend == primary.backend_type() || !root.is_dir() {
                continue;
            }
            tracing::debug!(backend = %backend, root = %root.display(), "Registering URL resolver");
            resolvers.push(Arc::new(LocalStorage::resolver_only(
                root,
                config.public_base_url(),
                backend,
            )));
        }
    }
    #[cfg(not(any(feature = "storage-s3", feature = "storage-local")))]
    let _ = config;

    resolvers
}
