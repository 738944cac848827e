//! Shared key generation for storage backends.
//!
//! Key format: `{folder}/{unix_millis}-{sanitized_basename}{ext}`. All backends go
//! through this module so keys look the same whichever backend issued them.

use std::sync::atomic::{AtomicI64, Ordering};

use vrgallery_core::constants::DEFAULT_FOLDER;

use crate::{StorageError, StorageResult};

const MAX_BASENAME_LENGTH: usize = 100;
const MAX_EXTENSION_LENGTH: usize = 16;

static LAST_TIMESTAMP_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Milliseconds since the Unix epoch, strictly increasing across calls in this process.
///
/// When the wall clock has not advanced (or went backwards) the previous value plus
/// one is returned instead.
pub fn next_timestamp_millis() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_TIMESTAMP_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_TIMESTAMP_MILLIS.compare_exchange_weak(
            last,
            next,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Resolve an optional folder to a safe relative path.
///
/// `None` or blank selects the default folder. Nested folders (`artists/covers`)
/// are allowed; every segment must be `[A-Za-z0-9_-]+`.
pub fn normalize_folder(folder: Option<&str>) -> StorageResult<String> {
    let folder = folder.map(|f| f.trim().trim_matches('/')).unwrap_or("");
    if folder.is_empty() {
        return Ok(DEFAULT_FOLDER.to_string());
    }

    for segment in folder.split('/') {
        let valid = !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(format!(
                "Invalid folder name: {}",
                folder
            )));
        }
    }

    Ok(folder.to_string())
}

/// Split an uploaded file name into a sanitized basename and extension (with dot).
///
/// Directory components are dropped, characters outside `[A-Za-z0-9._-]` become `_`.
pub fn sanitize_file_name(file_name: &str) -> (String, String) {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx + 1..]),
        _ => (name, ""),
    };

    let basename: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_BASENAME_LENGTH)
        .collect();
    let basename = if basename.trim_matches(['_', '.']).is_empty() {
        "file".to_string()
    } else {
        basename
    };

    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_LENGTH)
        .collect();
    let ext = if ext.is_empty() {
        String::new()
    } else {
        format!(".{}", ext)
    };

    (basename, ext)
}

/// Generate a storage key for an upload.
pub fn generate_storage_key(folder: Option<&str>, file_name: &str) -> StorageResult<String> {
    let folder = normalize_folder(folder)?;
    let (basename, ext) = sanitize_file_name(file_name);
    Ok(format!(
        "{}/{}-{}{}",
        folder,
        next_timestamp_millis(),
        basename,
        ext
    ))
}

/// Reject keys that could escape a backend root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.split('/').any(|segment| segment == ".." || segment == ".")
    {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_strictly_increase() {
        let a = next_timestamp_millis();
        let b = next_timestamp_millis();
        let c = next_timestamp_millis();
        assert!(a < b && b < c);
    }

    #[test]
    fn same_name_same_folder_gets_distinct_keys() {
        let first = generate_storage_key(Some("artists"), "portrait.jpg").unwrap();
        let second = generate_storage_key(Some("artists"), "portrait.jpg").unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("artists/"));
        assert!(first.ends_with("-portrait.jpg"));
    }

    #[test]
    fn key_has_timestamp_prefix() {
        let key = generate_storage_key(None, "a.png").unwrap();
        let file = key.strip_prefix("artists/").unwrap();
        let (ts, rest) = file.split_once('-').unwrap();
        assert!(ts.parse::<i64>().unwrap() > 0);
        assert_eq!(rest, "a.png");
    }

    #[test]
    fn sanitize_drops_directories_and_odd_characters() {
        assert_eq!(
            sanitize_file_name("../../etc/pass wd.JPG"),
            ("pass_wd".to_string(), ".JPG".to_string())
        );
        assert_eq!(
            sanitize_file_name("C:\\photos\\me.png"),
            ("me".to_string(), ".png".to_string())
        );
        assert_eq!(
            sanitize_file_name("my.photo.webp"),
            ("my.photo".to_string(), ".webp".to_string())
        );
        assert_eq!(
            sanitize_file_name(".hidden"),
            ("file".to_string(), String::new())
        );
        assert_eq!(sanitize_file_name("???.gif"), ("file".to_string(), ".gif".to_string()));
        assert_eq!(sanitize_file_name(""), ("file".to_string(), String::new()));
    }

    #[test]
    fn folder_defaults_and_validation() {
        assert_eq!(normalize_folder(None).unwrap(), "artists");
        assert_eq!(normalize_folder(Some("  ")).unwrap(), "artists");
        assert_eq!(normalize_folder(Some("/staff/")).unwrap(), "staff");
        assert_eq!(normalize_folder(Some("artists/covers")).unwrap(), "artists/covers");
        assert!(normalize_folder(Some("../etc")).is_err());
        assert!(normalize_folder(Some("a//b")).is_err());
        assert!(normalize_folder(Some("with space")).is_err());
    }

    #[test]
    fn validate_key_rejects_traversal() {
        assert!(validate_key("artists/1-a.png").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("artists/../../x").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("").is_err());
    }
}
