use crate::keys::{generate_storage_key, validate_key};
use crate::traits::{
    is_url, strip_query, DeleteOutcome, Storage, StorageError, StorageResult, StoredObject,
};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStore, ObjectStoreExt, PutMultipartOptions,
    PutOptions, PutPayload, WriteMultipart,
};
use vrgallery_core::StorageConfig;

/// S3 storage implementation
///
/// Objects are written with `x-amz-acl: public-read` so the returned URL is
/// directly fetchable by clients.
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    multipart_threshold: usize,
}

impl S3Storage {
    /// Create a new S3Storage instance from the resolved storage configuration.
    ///
    /// No network traffic happens here; reachability is checked by the selector.
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let (Some(access_key), Some(secret_key)) = (
            config.aws_access_key_id.as_deref(),
            config.aws_secret_access_key.as_deref(),
        ) else {
            return Err(StorageError::ConfigError(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY are required for S3".to_string(),
            ));
        };

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            HeaderName::from_static("x-amz-acl"),
            HeaderValue::from_static("public-read"),
        );

        let mut builder = AmazonS3Builder::new()
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key)
            .with_region(config.aws_region.clone())
            .with_bucket_name(config.s3_bucket.clone())
            .with_client_options(
                ClientOptions::new()
                    .with_default_headers(default_headers)
                    .with_timeout(config.timeout),
            );

        let endpoint_url = config
            .s3_endpoint
            .as_ref()
            .map(|e| e.trim_end_matches('/').to_string());
        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_virtual_hosted_style_request(false)
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket: config.s3_bucket.clone(),
            region: config.aws_region.clone(),
            endpoint_url,
            multipart_threshold: config.s3_multipart_threshold_bytes,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn uses_multipart(&self, size: usize) -> bool {
        size > self.multipart_threshold
    }

    /// URL prefixes this bucket may have issued, canonical form first.
    fn url_prefixes(&self) -> Vec<String> {
        match self.endpoint_url {
            Some(ref endpoint) => vec![format!("{}/{}/", endpoint, self.bucket)],
            None => vec![
                format!("https://{}.s3.{}.amazonaws.com/", self.bucket, self.region),
                format!("https://{}.s3.amazonaws.com/", self.bucket),
            ],
        }
    }

    async fn put_multipart(
        &self,
        location: &Path,
        attributes: Attributes,
        data: Bytes,
    ) -> Result<(), ObjectStoreError> {
        let options = PutMultipartOptions {
            attributes,
            ..Default::default()
        };
        let upload = self.store.put_multipart_opts(location, options).await?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.multipart_threshold);

        for chunk in data.chunks(self.multipart_threshold) {
            if let Err(e) = writer.wait_for_capacity(4).await {
                let _ = writer.abort().await;
                return Err(e);
            }
            writer.write(chunk);
        }

        writer.finish().await.map(|_| ())
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn store(
        &self,
        folder: Option<&str>,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject> {
        let key = generate_storage_key(folder, file_name)?;
        let size = data.len();
        let location = Path::from(key.clone());

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let start = std::time::Instant::now();
        let multipart = self.uses_multipart(size);

        let result = if multipart {
            self.put_multipart(&location, attributes, data).await
        } else {
            let options = PutOptions {
                attributes,
                ..Default::default()
            };
            self.store
                .put_opts(&location, PutPayload::from(data), options)
                .await
                .map(|_| ())
        };

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                multipart,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::WriteFailed(e.to_string())
        })?;

        let url = self.url_for(&key);

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            multipart,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
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
            StorageError::InvalidKey(format!("URL not issued by this bucket: {}", url_or_key))
        })?;
        validate_key(&key)?;

        let start = std::time::Instant::now();
        let location = Path::from(key.clone());

        // S3 DELETE succeeds on missing keys; HEAD first to report NotFound.
        match self.store.head(&location).await {
            Ok(_) => {}
            Err(ObjectStoreError::NotFound { .. }) => {
                tracing::debug!(bucket = %self.bucket, key = %key, "S3 delete: object not found");
                return Ok(DeleteOutcome::NotFound);
            }
            Err(e) => return Err(StorageError::DeleteFailed(e.to_string())),
        }

        self.store.delete(&location).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(DeleteOutcome::Deleted)
    }

    /// For AWS S3, uses the standard format: https://{bucket}.s3.{region}.amazonaws.com/{key}
    /// For S3-compatible providers, uses path-style: {endpoint}/{bucket}/{key}
    fn url_for(&self, key: &str) -> String {
        match self.endpoint_url {
            Some(ref endpoint) => format!("{}/{}/{}", endpoint, self.bucket, key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }

    fn key_for_url(&self, url_or_key: &str) -> Option<String> {
        let trimmed = strip_query(url_or_key.trim());
        if !is_url(trimmed) {
            // Root-relative paths are only ever issued by disk backends.
            if trimmed.starts_with('/') {
                return None;
            }
            return Some(trimmed.to_string());
        }

        let encoded_key = self
            .url_prefixes()
            .into_iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix.as_str()).map(str::to_string))?;
        let key = urlencoding::decode(&encoded_key).ok()?.into_owned();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    /// Lists the bucket root. An object HEAD cannot tell a missing key from a
    /// missing bucket (both are a bodiless 404), a listing can.
    async fn is_ready(&self) -> bool {
        match self.store.list_with_delimiter(None).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, bucket = %self.bucket, "S3 bucket listing failed");
                false
            }
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
