//! Types used by the upload pipeline

use bytes::Bytes;
use vrgallery_core::UploadLimitsConfig;
use vrgallery_storage::StorageError;

/// Field name of the single-file upload route.
pub const SINGLE_FILE_FIELD: &str = "file";
pub const PROFILE_IMAGE_FIELD: &str = "profileImage";
pub const WORK_IMAGES_FIELD: &str = "workImages";

/// One file part as received from a multipart request (or handed over by any other caller).
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl IncomingFile {
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A named file field and how many files it may carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub max_count: usize,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, max_count: usize) -> Self {
        Self {
            name: name.into(),
            max_count,
        }
    }
}

/// Which file fields a route accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSelector {
    /// Exactly one file in the named field.
    Single(String),
    /// One or more files in the named field, up to `max_count`.
    Array { field: String, max_count: usize },
    /// Several named fields, each with its own limit.
    Fields(Vec<FieldSpec>),
}

impl UploadSelector {
    /// Per-field limit, `None` when the field is not accepted at all.
    pub fn max_count_for(&self, field_name: &str) -> Option<usize> {
        match self {
            UploadSelector::Single(field) => (field == field_name).then_some(1),
            UploadSelector::Array { field, max_count } => {
                (field == field_name).then_some(*max_count)
            }
            UploadSelector::Fields(fields) => fields
                .iter()
                .find(|spec| spec.name == field_name)
                .map(|spec| spec.max_count),
        }
    }
}

/// Per-route upload contract: accepted fields, total size ceiling, MIME allow-list.
#[derive(Debug, Clone)]
pub struct UploadRoute {
    pub selector: UploadSelector,
    pub max_total_bytes: usize,
    /// Patterns such as `image/*` or `image/png`.
    pub allowed_content_types: Vec<String>,
}

impl UploadRoute {
    /// Single `file` field, used by the generic upload endpoint.
    pub fn single(limits: &UploadLimitsConfig) -> Self {
        Self {
            selector: UploadSelector::Single(SINGLE_FILE_FIELD.to_string()),
            max_total_bytes: limits.single_upload_max_bytes,
            allowed_content_types: limits.allowed_content_types.clone(),
        }
    }

    /// `workImages` array for gallery additions.
    pub fn work_images(limits: &UploadLimitsConfig) -> Self {
        Self {
            selector: UploadSelector::Array {
                field: WORK_IMAGES_FIELD.to_string(),
                max_count: limits.max_files_per_upload,
            },
            max_total_bytes: limits.gallery_upload_max_bytes,
            allowed_content_types: limits.allowed_content_types.clone(),
        }
    }

    /// `profileImage` plus `workImages`, as sent by the artist profile form.
    pub fn gallery(limits: &UploadLimitsConfig) -> Self {
        Self {
            selector: UploadSelector::Fields(vec![
                FieldSpec::new(PROFILE_IMAGE_FIELD, 1),
                FieldSpec::new(WORK_IMAGES_FIELD, limits.max_files_per_upload),
            ]),
            max_total_bytes: limits.gallery_upload_max_bytes,
            allowed_content_types: limits.allowed_content_types.clone(),
        }
    }

    pub fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let normalized = normalize_mime_type(content_type);
        self.allowed_content_types
            .iter()
            .any(|pattern| mime_matches_pattern(&normalized, pattern))
    }
}

/// Lowercased MIME essence without parameters ("image/JPEG; q=1" -> "image/jpeg").
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}

fn mime_matches_pattern(mime: &str, pattern: &str) -> bool {
    let pattern = pattern.trim();
    if let Some((kind, subtype)) = pattern.split_once('/') {
        if subtype == "*" {
            return mime
                .split_once('/')
                .is_some_and(|(mime_kind, rest)| {
                    !rest.is_empty() && mime_kind.eq_ignore_ascii_case(kind)
                });
        }
    }
    mime.eq_ignore_ascii_case(pattern)
}

/// Request-level rejections; all of them happen before any byte is persisted.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Unsupported media type '{content_type}': only image files are allowed")]
    UnsupportedMediaType { content_type: String },

    #[error("Upload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("No file provided")]
    MissingFile,

    #[error("Too many files in '{field}': at most {max} allowed")]
    TooManyFiles { field: String, max: usize },

    #[error("Unexpected file field '{0}'")]
    UnexpectedField(String),

    #[error("Invalid folder: {0}")]
    InvalidFolder(String),

    #[error("Malformed multipart request: {0}")]
    MalformedMultipart(String),
}

/// Failure of an upload pipeline call.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> UploadLimitsConfig {
        UploadLimitsConfig {
            default_folder: "artists".to_string(),
            single_upload_max_bytes: 20,
            gallery_upload_max_bytes: 10,
            max_files_per_upload: 10,
            allowed_content_types: vec!["image/*".to_string()],
        }
    }

    #[test]
    fn image_wildcard_matches_any_image_subtype() {
        let route = UploadRoute::single(&limits());
        assert!(route.is_content_type_allowed("image/jpeg"));
        assert!(route.is_content_type_allowed("IMAGE/PNG; charset=binary"));
        assert!(!route.is_content_type_allowed("application/pdf"));
        assert!(!route.is_content_type_allowed("image/"));
        assert!(!route.is_content_type_allowed("imagery/png"));
    }

    #[test]
    fn exact_patterns_only_match_themselves() {
        let mut limits = limits();
        limits.allowed_content_types = vec!["image/png".to_string()];
        let route = UploadRoute::single(&limits);
        assert!(route.is_content_type_allowed("image/png"));
        assert!(!route.is_content_type_allowed("image/gif"));
    }

    #[test]
    fn selector_field_limits() {
        let gallery = UploadRoute::gallery(&limits()).selector;
        assert_eq!(gallery.max_count_for("profileImage"), Some(1));
        assert_eq!(gallery.max_count_for("workImages"), Some(10));
        assert_eq!(gallery.max_count_for("avatar"), None);

        let single = UploadRoute::single(&limits()).selector;
        assert_eq!(single.max_count_for("file"), Some(1));
        assert_eq!(single.max_count_for("workImages"), None);
    }
}
