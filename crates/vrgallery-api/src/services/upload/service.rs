//! Upload pipeline
//!
//! Workflow: cardinality → MIME allow-list → size ceiling → store (parallel) → roll back on
//! partial failure. Nothing reaches the backend until every file has passed validation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use vrgallery_storage::keys::normalize_folder;
use vrgallery_storage::{Storage, StorageError, StoredObject};

use super::types::{IncomingFile, UploadError, UploadRoute, UploadSelector, ValidationError};

/// Validates incoming files and hands them to the selected backend.
#[derive(Clone)]
pub struct UploadPipeline {
    storage: Arc<dyn Storage>,
    default_folder: String,
    timeout: Duration,
}

impl UploadPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        default_folder: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            storage,
            default_folder: default_folder.into(),
            timeout,
        }
    }

    /// Validate and store one file; returns the stored object (URL included).
    pub async fn store_file(
        &self,
        route: &UploadRoute,
        file: IncomingFile,
        folder: Option<&str>,
    ) -> Result<StoredObject, UploadError> {
        let mut stored = self.store_files(route, vec![file], folder).await?;
        stored
            .pop()
            .ok_or_else(|| UploadError::Validation(ValidationError::MissingFile))
    }

    /// Validate and store several files in parallel.
    ///
    /// Results keep the input order. If any store fails, objects already written by
    /// this call are deleted (best-effort) and the call fails as a whole.
    pub async fn store_files(
        &self,
        route: &UploadRoute,
        files: Vec<IncomingFile>,
        folder: Option<&str>,
    ) -> Result<Vec<StoredObject>, UploadError> {
        validate_files(route, &files)?;
        let folder = self.resolve_folder(folder)?;

        let start = Instant::now();
        let total_bytes: usize = files.iter().map(IncomingFile::size).sum();
        let file_count = files.len();

        let results = join_all(files.into_iter().map(|file| self.store_one(&folder, file))).await;

        let mut stored = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(object) => stored.push(object),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(error) = first_error {
            tracing::error!(
                error = %error,
                folder = %folder,
                file_count,
                stored_before_failure = stored.len(),
                "Upload failed, removing objects already written by this request"
            );
            self.roll_back(&stored).await;
            return Err(UploadError::Storage(error));
        }

        tracing::info!(
            folder = %folder,
            file_count,
            total_bytes,
            backend = %self.storage.backend_type(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload stored"
        );

        Ok(stored)
    }

    fn resolve_folder(&self, folder: Option<&str>) -> Result<String, ValidationError> {
        let requested = folder
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(self.default_folder.as_str());
        normalize_folder(Some(requested))
            .map_err(|_| ValidationError::InvalidFolder(requested.to_string()))
    }

    async fn store_one(
        &self,
        folder: &str,
        file: IncomingFile,
    ) -> Result<StoredObject, StorageError> {
        let call = self.storage.store(
            Some(folder),
            &file.file_name,
            &file.content_type,
            file.data,
        );
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| match e {
                StorageError::WriteFailed(_) => e,
                other => StorageError::WriteFailed(other.to_string()),
            }),
            Err(_) => Err(StorageError::WriteFailed(format!(
                "Store of '{}' timed out after {:?}",
                file.file_name, self.timeout
            ))),
        }
    }

    async fn roll_back(&self, stored: &[StoredObject]) {
        let deletions = stored.iter().map(|object| async move {
            match tokio::time::timeout(self.timeout, self.storage.delete(&object.key)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, key = %object.key, "Rollback delete failed");
                }
                Err(_) => {
                    tracing::warn!(key = %object.key, "Rollback delete timed out");
                }
            }
        });
        join_all(deletions).await;
    }
}

/// Check cardinality, MIME types and total size, in that order.
pub fn validate_files(route: &UploadRoute, files: &[IncomingFile]) -> Result<(), ValidationError> {
    validate_cardinality(&route.selector, files)?;

    if let Some(rejected) = files
        .iter()
        .find(|file| !route.is_content_type_allowed(&file.content_type))
    {
        return Err(ValidationError::UnsupportedMediaType {
            content_type: rejected.content_type.clone(),
        });
    }

    let total: usize = files.iter().map(IncomingFile::size).sum();
    if total > route.max_total_bytes {
        return Err(ValidationError::PayloadTooLarge {
            size: total,
            max: route.max_total_bytes,
        });
    }

    Ok(())
}

fn validate_cardinality(
    selector: &UploadSelector,
    files: &[IncomingFile],
) -> Result<(), ValidationError> {
    if files.is_empty() {
        return Err(ValidationError::MissingFile);
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for file in files {
        let max = selector
            .max_count_for(&file.field_name)
            .ok_or_else(|| ValidationError::UnexpectedField(file.field_name.clone()))?;
        let count = counts.entry(file.field_name.as_str()).or_default();
        *count += 1;
        if *count > max {
            return Err(ValidationError::TooManyFiles {
                field: file.field_name.clone(),
                max,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use support::RecordingStorage;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vrgallery_core::UploadLimitsConfig;
    use vrgallery_storage::{DeleteOutcome, StorageBackend, StorageResult};

    const MB: usize = 1024 * 1024;

    fn limits() -> UploadLimitsConfig {
        UploadLimitsConfig {
            default_folder: "artists".to_string(),
            single_upload_max_bytes: 20 * MB,
            gallery_upload_max_bytes: 10 * MB,
            max_files_per_upload: 10,
            allowed_content_types: vec!["image/*".to_string()],
        }
    }

    fn image(field: &str, name: &str, size: usize) -> IncomingFile {
        IncomingFile::new(field, name, "image/jpeg", vec![0u8; size])
    }

    #[test]
    fn non_image_is_rejected_before_size() {
        let route = UploadRoute::single(&limits());
        let file = IncomingFile::new("file", "doc.pdf", "application/pdf", vec![0u8; 30 * MB]);
        assert!(matches!(
            validate_files(&route, &[file]),
            Err(ValidationError::UnsupportedMediaType { .. })
        ));
    }

    #[test]
    fn oversized_gallery_upload_is_rejected() {
        let route = UploadRoute::work_images(&limits());
        let result = validate_files(&route, &[image("workImages", "big.jpg", 11 * MB)]);
        assert!(matches!(
            result,
            Err(ValidationError::PayloadTooLarge { max, .. }) if max == 10 * MB
        ));
    }

    #[test]
    fn cardinality_rules() {
        let single = UploadRoute::single(&limits());
        assert!(matches!(
            validate_files(&single, &[]),
            Err(ValidationError::MissingFile)
        ));
        assert!(matches!(
            validate_files(&single, &[image("avatar", "a.jpg", 1)]),
            Err(ValidationError::UnexpectedField(field)) if field == "avatar"
        ));
        assert!(matches!(
            validate_files(&single, &[image("file", "a.jpg", 1), image("file", "b.jpg", 1)]),
            Err(ValidationError::TooManyFiles { max: 1, .. })
        ));

        let gallery = UploadRoute::gallery(&limits());
        let eleven: Vec<_> = (0..11)
            .map(|i| image("workImages", &format!("{}.jpg", i), 1))
            .collect();
        assert!(matches!(
            validate_files(&gallery, &eleven),
            Err(ValidationError::TooManyFiles { max: 10, .. })
        ));
        assert!(validate_files(
            &gallery,
            &[image("profileImage", "p.jpg", 1), image("workImages", "w.jpg", 1)]
        )
        .is_ok());
    }

    mod support {
        use super::*;
        use std::sync::Mutex;

        #[derive(Default)]
        pub struct RecordingStorage {
            pub stores: AtomicUsize,
            pub deleted: Mutex<Vec<String>>,
            pub fail_on: Option<String>,
            /// Store of this file name never completes.
            pub stall_on: Option<String>,
        }

        #[async_trait::async_trait]
        impl Storage for RecordingStorage {
            async fn store(
                &self,
                folder: Option<&str>,
                file_name: &str,
                content_type: &str,
                data: Bytes,
            ) -> StorageResult<StoredObject> {
                let n = self.stores.fetch_add(1, Ordering::SeqCst);
                if self.fail_on.as_deref() == Some(file_name) {
                    return Err(StorageError::WriteFailed("disk full".to_string()));
                }
                if self.stall_on.as_deref() == Some(file_name) {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                let key = format!("{}/{}-{}", folder.unwrap_or("artists"), n, file_name);
                Ok(StoredObject {
                    url: self.url_for(&key),
                    key,
                    size_bytes: data.len() as u64,
                    content_type: content_type.to_string(),
                })
            }

            async fn delete(&self, url_or_key: &str) -> StorageResult<DeleteOutcome> {
                self.deleted.lock().unwrap().push(url_or_key.to_string());
                Ok(DeleteOutcome::Deleted)
            }

            fn url_for(&self, key: &str) -> String {
                format!("http://test/uploads/{}", key)
            }

            fn key_for_url(&self, url_or_key: &str) -> Option<String> {
                Some(url_or_key.trim_start_matches("http://test/uploads/").to_string())
            }

            async fn is_ready(&self) -> bool {
                true
            }

            fn backend_type(&self) -> StorageBackend {
                StorageBackend::Local
            }
        }
    }

    fn pipeline(storage: Arc<RecordingStorage>) -> UploadPipeline {
        UploadPipeline::new(storage, "artists", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn rejected_upload_never_reaches_backend() {
        let storage = Arc::new(RecordingStorage::default());
        let file = IncomingFile::new("file", "notes.txt", "text/plain", vec![1u8; 10]);

        let result = pipeline(storage.clone())
            .store_file(&UploadRoute::single(&limits()), file, None)
            .await;

        assert!(matches!(
            result,
            Err(UploadError::Validation(ValidationError::UnsupportedMediaType { .. }))
        ));
        assert_eq!(storage.stores.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn batch_keeps_input_order() {
        let storage = Arc::new(RecordingStorage::default());
        let files = vec![
            image("workImages", "first.jpg", 3),
            image("workImages", "second.jpg", 2),
            image("workImages", "third.jpg", 1),
        ];

        let stored = pipeline(storage)
            .store_files(&UploadRoute::work_images(&limits()), files, Some("staff"))
            .await
            .unwrap();

        let sizes: Vec<_> = stored.iter().map(|o| o.size_bytes).collect();
        assert_eq!(sizes, vec![3, 2, 1]);
        assert!(stored[0].key.ends_with("first.jpg"));
        assert!(stored[2].key.ends_with("third.jpg"));
        assert!(stored.iter().all(|o| o.key.starts_with("staff/")));
    }

    #[tokio::test]
    async fn partial_failure_rolls_back_written_objects() {
        let storage = Arc::new(RecordingStorage {
            fail_on: Some("broken.jpg".to_string()),
            ..Default::default()
        });
        let files = vec![
            image("workImages", "ok-1.jpg", 1),
            image("workImages", "broken.jpg", 1),
            image("workImages", "ok-2.jpg", 1),
        ];

        let result = pipeline(storage.clone())
            .store_files(&UploadRoute::work_images(&limits()), files, None)
            .await;

        assert!(matches!(
            result,
            Err(UploadError::Storage(StorageError::WriteFailed(_)))
        ));
        let mut deleted = storage.deleted.lock().unwrap().clone();
        deleted.sort();
        assert_eq!(deleted.len(), 2);
        assert!(deleted.iter().all(|key| key.contains("ok-")));
    }

    #[tokio::test]
    async fn store_past_timeout_fails_and_rolls_back() {
        let storage = Arc::new(RecordingStorage {
            stall_on: Some("slow.jpg".to_string()),
            ..Default::default()
        });
        let pipeline = UploadPipeline::new(storage.clone(), "artists", Duration::from_millis(50));
        let files = vec![
            image("workImages", "fast.jpg", 1),
            image("workImages", "slow.jpg", 1),
        ];

        let result = pipeline
            .store_files(&UploadRoute::work_images(&limits()), files, None)
            .await;

        match result {
            Err(UploadError::Storage(StorageError::WriteFailed(msg))) => {
                assert!(msg.contains("timed out"), "{}", msg)
            }
            other => panic!("expected WriteFailed, got {:?}", other.map(|v| v.len())),
        }
        let deleted = storage.deleted.lock().unwrap().clone();
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].ends_with("fast.jpg"));
    }

    #[tokio::test]
    async fn invalid_folder_is_a_validation_error() {
        let storage = Arc::new(RecordingStorage::default());
        let result = pipeline(storage.clone())
            .store_file(
                &UploadRoute::single(&limits()),
                image("file", "a.jpg", 1),
                Some("../secrets"),
            )
            .await;

        assert!(matches!(
            result,
            Err(UploadError::Validation(ValidationError::InvalidFolder(_)))
        ));
        assert_eq!(storage.stores.load(Ordering::SeqCst), 0);
    }
}
