//! Multipart extraction for upload handlers

use std::collections::HashMap;

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use bytes::BytesMut;

use crate::services::upload::{IncomingFile, UploadRoute, ValidationError};

/// Text field carrying the optional destination folder.
pub const FOLDER_FIELD: &str = "folder";

/// Parsed multipart body: file parts in arrival order plus the requested folder.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<IncomingFile>,
    pub folder: Option<String>,
}

/// Read every part of an upload request against `route`.
///
/// Unknown file fields, surplus files and disallowed MIME types are rejected as soon as
/// the part header is seen; the body is read in chunks and abandoned once the route's
/// size ceiling is crossed. The full rule set runs again in the upload pipeline.
pub async fn read_upload_form(
    mut multipart: Multipart,
    route: &UploadRoute,
) -> Result<UploadForm, ValidationError> {
    let mut form = UploadForm::default();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut total_bytes = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ValidationError::MalformedMultipart(format!("Failed to read multipart: {}", e)))?
    {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();
        let file_name = field.file_name().map(|s| s.to_string());

        if file_name.is_none() {
            if field_name == FOLDER_FIELD {
                let value = field.text().await.map_err(|e| {
                    ValidationError::MalformedMultipart(format!("Failed to read folder: {}", e))
                })?;
                form.folder = Some(value);
            } else if route.selector.max_count_for(&field_name).is_none() {
                tracing::debug!(field = %field_name, "Ignoring unrelated form field");
            } else {
                return Err(ValidationError::MalformedMultipart(format!(
                    "Field '{}' must be a file part",
                    field_name
                )));
            }
            continue;
        }

        let max = route
            .selector
            .max_count_for(&field_name)
            .ok_or_else(|| ValidationError::UnexpectedField(field_name.clone()))?;
        let count = counts.entry(field_name.clone()).or_default();
        *count += 1;
        if *count > max {
            return Err(ValidationError::TooManyFiles {
                field: field_name,
                max,
            });
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        if !route.is_content_type_allowed(&content_type) {
            return Err(ValidationError::UnsupportedMediaType { content_type });
        }

        let data = read_field_capped(field, &mut total_bytes, route.max_total_bytes).await?;
        form.files.push(IncomingFile::new(
            field_name,
            file_name.unwrap_or_else(|| "unknown".to_string()),
            content_type,
            data,
        ));
    }

    Ok(form)
}

async fn read_field_capped(
    mut field: Field<'_>,
    total_bytes: &mut usize,
    max_total_bytes: usize,
) -> Result<bytes::Bytes, ValidationError> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ValidationError::MalformedMultipart(format!("Failed to read file data: {}", e)))?
    {
        *total_bytes += chunk.len();
        if *total_bytes > max_total_bytes {
            return Err(ValidationError::PayloadTooLarge {
                size: *total_bytes,
                max: max_total_bytes,
            });
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}
