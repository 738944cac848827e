//! Constants shared across crates.

/// Folder used when an upload does not name one.
pub const DEFAULT_FOLDER: &str = "artists";

/// URL path segment under which the local-disk root is served.
pub const LOCAL_URL_PREFIX: &str = "uploads";

/// URL path segment under which the VPS storage root is served.
pub const VPS_URL_PREFIX: &str = "storage";

/// Default bucket name when `AWS_S3_BUCKET_NAME` is unset.
pub const DEFAULT_BUCKET: &str = "vr-gallery-images";

/// Default AWS region when `AWS_REGION` is unset.
pub const DEFAULT_REGION: &str = "us-east-1";

pub const MB: usize = 1024 * 1024;
