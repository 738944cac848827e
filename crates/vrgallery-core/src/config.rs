//! Configuration module
//!
//! Process-wide configuration resolved once at start-up from the environment
//! (a `.env` file is honoured). Nothing here is re-read after start-up;
//! switching storage backends requires a restart.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_BUCKET, DEFAULT_FOLDER, DEFAULT_REGION, MB};
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 3000;
const SINGLE_UPLOAD_MAX_MB: usize = 20;
const GALLERY_UPLOAD_MAX_MB: usize = 10;
const MAX_FILES_PER_UPLOAD: usize = 10;
const S3_MULTIPART_THRESHOLD_MB: usize = 5;
const STORAGE_TIMEOUT_SECS: u64 = 30;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    /// Scheme and host used to build URLs for disk backends, e.g. `https://cdn.example.com`.
    pub public_base_url: String,
    pub cors_origins: Vec<String>,
    /// Requests handled at once before new ones queue.
    pub http_concurrency_limit: usize,
}

/// Inputs to backend selection
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Candidate tried first when set (`STORAGE_BACKEND`); the others keep their order.
    pub preferred_backend: Option<StorageBackend>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    pub s3_bucket: String,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, Spaces, ...)
    pub s3_bootstrap_bucket: bool,
    pub s3_multipart_threshold_bytes: usize,
    pub vps_storage_path: Option<PathBuf>,
    pub local_storage_path: PathBuf,
    /// Upper bound for a single backend call (store, delete, readiness probe).
    pub timeout: Duration,
}

impl StorageConfig {
    /// Both halves of the AWS key pair are present and non-empty.
    pub fn has_s3_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.aws_access_key_id) && present(&self.aws_secret_access_key)
    }

    /// Selector candidates in the order they should be attempted.
    pub fn candidate_order(&self) -> Vec<StorageBackend> {
        let mut order = StorageBackend::PRECEDENCE.to_vec();
        if let Some(preferred) = self.preferred_backend {
            order.retain(|b| *b != preferred);
            order.insert(0, preferred);
        }
        order
    }
}

/// Upload route ceilings and the MIME allow-list
#[derive(Clone, Debug)]
pub struct UploadLimitsConfig {
    pub default_folder: String,
    pub single_upload_max_bytes: usize,
    pub gallery_upload_max_bytes: usize,
    pub max_files_per_upload: usize,
    /// Patterns such as `image/*` or `image/png`.
    pub allowed_content_types: Vec<String>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    pub storage: StorageConfig,
    pub uploads: UploadLimitsConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let server_port: u16 = match var("PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            None => SERVER_PORT,
        };

        let public_base_url = var("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", server_port))
            .trim_end_matches('/')
            .to_string();

        let cors_origins = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let preferred_backend = var("STORAGE_BACKEND")
            .map(|s| StorageBackend::from_str(&s))
            .transpose()?;

        let local_storage_path = var("LOCAL_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join("uploads")
            });

        let storage = StorageConfig {
            preferred_backend,
            aws_access_key_id: var("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            aws_region: var("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            s3_bucket: var("AWS_S3_BUCKET_NAME").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            s3_endpoint: var("S3_ENDPOINT"),
            s3_bootstrap_bucket: parse_or(&var, "S3_BOOTSTRAP_BUCKET", false)?,
            s3_multipart_threshold_bytes: megabytes_or(
                &var,
                "S3_MULTIPART_THRESHOLD_MB",
                S3_MULTIPART_THRESHOLD_MB,
            )?,
            vps_storage_path: var("VPS_STORAGE_PATH").map(PathBuf::from),
            local_storage_path,
            timeout: Duration::from_secs(parse_or(
                &var,
                "STORAGE_TIMEOUT_SECS",
                STORAGE_TIMEOUT_SECS,
            )?),
        };

        let uploads = UploadLimitsConfig {
            default_folder: var("DEFAULT_UPLOAD_FOLDER")
                .unwrap_or_else(|| DEFAULT_FOLDER.to_string()),
            single_upload_max_bytes: megabytes_or(
                &var,
                "SINGLE_UPLOAD_MAX_MB",
                SINGLE_UPLOAD_MAX_MB,
            )?,
            gallery_upload_max_bytes: megabytes_or(
                &var,
                "GALLERY_UPLOAD_MAX_MB",
                GALLERY_UPLOAD_MAX_MB,
            )?,
            max_files_per_upload: parse_or(&var, "MAX_FILES_PER_UPLOAD", MAX_FILES_PER_UPLOAD)?,
            allowed_content_types: var("ALLOWED_CONTENT_TYPES")
                .unwrap_or_else(|| "image/*".to_string())
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        };

        let config = Config {
            base: BaseConfig {
                server_port,
                environment,
                public_base_url,
                cors_origins,
                http_concurrency_limit: parse_or(
                    &var,
                    "HTTP_CONCURRENCY_LIMIT",
                    HTTP_CONCURRENCY_LIMIT,
                )?,
            },
            storage,
            uploads,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.base.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if !self.base.public_base_url.starts_with("http://")
            && !self.base.public_base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "PUBLIC_BASE_URL must start with http:// or https://"
            ));
        }

        if self.storage.aws_access_key_id.is_some() != self.storage.aws_secret_access_key.is_some()
        {
            return Err(anyhow::anyhow!(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together"
            ));
        }

        if self.storage.s3_multipart_threshold_bytes < 5 * MB {
            // S3 rejects multipart parts smaller than 5 MiB (except the last one)
            return Err(anyhow::anyhow!(
                "S3_MULTIPART_THRESHOLD_MB must be at least 5"
            ));
        }

        if self.storage.timeout.is_zero() {
            return Err(anyhow::anyhow!("STORAGE_TIMEOUT_SECS must be greater than 0"));
        }

        if self.uploads.single_upload_max_bytes == 0 || self.uploads.gallery_upload_max_bytes == 0
        {
            return Err(anyhow::anyhow!("Upload size ceilings must be greater than 0"));
        }

        if self.uploads.max_files_per_upload == 0 {
            return Err(anyhow::anyhow!("MAX_FILES_PER_UPLOAD must be greater than 0"));
        }

        if self.uploads.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_CONTENT_TYPES cannot be empty"));
        }

        // Only images may ever reach a backend, whatever the operator lists here.
        if let Some(pattern) = self
            .uploads
            .allowed_content_types
            .iter()
            .find(|pattern| !is_image_pattern(pattern))
        {
            return Err(anyhow::anyhow!(
                "ALLOWED_CONTENT_TYPES entry '{}' is not an image type (expected image/* or image/<subtype>)",
                pattern
            ));
        }

        if self.base.http_concurrency_limit == 0 {
            return Err(anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT must be greater than 0"));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn public_base_url(&self) -> &str {
        &self.base.public_base_url
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.base.cors_origins
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", key, raw.trim())),
        None => Ok(default),
    }
}

fn megabytes_or<F>(var: &F, key: &str, default: usize) -> Result<usize, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(var, key, default)?
        .checked_mul(MB)
        .ok_or_else(|| anyhow::anyhow!("{} is too large", key))
}

/// `image/*` or `image/<subtype>`.
fn is_image_pattern(pattern: &str) -> bool {
    pattern
        .split_once('/')
        .is_some_and(|(kind, subtype)| kind == "image" && !subtype.is_empty())
}
