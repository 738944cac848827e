//! Asset lifecycle operations: deleting stored objects when the entity that references
//! them replaces or drops the reference.
//!
//! Deletion is best-effort. A failure is logged and reported back in the
//! [`CleanupReport`], but never turned into an error for the entity mutation that
//! triggered it.

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use utoipa::ToSchema;
use vrgallery_storage::{DeleteOutcome, StorageError, StorageSelection};

/// Upper bound on concurrent deletions issued by one lifecycle call.
const MAX_CONCURRENT_DELETES: usize = 16;

/// A deletion the backend could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FailedDeletion {
    pub url: String,
    pub error: String,
}

/// Per-URL result of a lifecycle call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct CleanupReport {
    /// Objects found and removed.
    pub deleted: Vec<String>,
    /// Nothing stored at that location (already gone, or not issued by any known backend).
    pub missing: Vec<String>,
    /// Backend failures; logged at WARN, safe to retry later.
    pub failed: Vec<FailedDeletion>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.missing.len() + self.failed.len()
    }
}

/// Routes deletions to the backend that issued each URL.
#[derive(Clone)]
pub struct AssetLifecycle {
    selection: StorageSelection,
    timeout: Duration,
}

impl AssetLifecycle {
    pub fn new(selection: StorageSelection, timeout: Duration) -> Self {
        Self { selection, timeout }
    }

    /// Delete the object behind `url`.
    ///
    /// `NotFound` covers both "already gone" and "not a URL any known backend issued".
    /// A timeout is a [`StorageError::Timeout`], never `NotFound`.
    pub async fn delete_by_url(&self, url: &str) -> Result<DeleteOutcome, StorageError> {
        let Some((storage, key)) = self.selection.resolve(url) else {
            tracing::warn!(url = %url, "URL not recognised by any storage backend; nothing to delete");
            return Ok(DeleteOutcome::NotFound);
        };

        tracing::debug!(url = %url, key = %key, backend = %storage.backend_type(), "Deleting asset");

        match tokio::time::timeout(self.timeout, storage.delete(&key)).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.timeout)),
        }
    }

    /// A single reference changed from `old_url` to `new_url`.
    ///
    /// Deletes `old_url` when it is non-empty and differs from `new_url`.
    pub async fn on_replace(&self, old_url: Option<&str>, new_url: Option<&str>) -> CleanupReport {
        let old = old_url.map(str::trim).filter(|u| !u.is_empty());
        let new = new_url.map(str::trim).filter(|u| !u.is_empty());

        match old {
            Some(old) if Some(old) != new => self.delete_all(vec![old.to_string()]).await,
            _ => CleanupReport::default(),
        }
    }

    /// An array reference changed; deletes `old_urls - new_urls`.
    pub async fn on_replace_many(&self, old_urls: &[String], new_urls: &[String]) -> CleanupReport {
        let kept: HashSet<&str> = new_urls.iter().map(|u| u.trim()).collect();
        let removed = old_urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !kept.contains(u))
            .map(str::to_string)
            .collect();
        self.delete_all(removed).await
    }

    /// The owning entity was deleted; every URL it held goes.
    pub async fn on_entity_deleted(&self, urls: &[String]) -> CleanupReport {
        self.delete_all(urls.to_vec()).await
    }

    async fn delete_all(&self, urls: Vec<String>) -> CleanupReport {
        let mut seen = HashSet::new();
        let urls: Vec<String> = urls
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty() && seen.insert(u.clone()))
            .collect();

        if urls.is_empty() {
            return CleanupReport::default();
        }

        let outcomes: Vec<(String, Result<DeleteOutcome, StorageError>)> = stream::iter(urls)
            .map(|url| async move {
                let outcome = self.delete_by_url(&url).await;
                (url, outcome)
            })
            .buffer_unordered(MAX_CONCURRENT_DELETES)
            .collect()
            .await;

        let mut report = CleanupReport::default();
        for (url, outcome) in outcomes {
            match outcome {
                Ok(DeleteOutcome::Deleted) => report.deleted.push(url),
                Ok(DeleteOutcome::NotFound) => report.missing.push(url),
                Err(e) => {
                    tracing::warn!(error = %e, url = %url, "Failed to delete replaced asset");
                    report.failed.push(FailedDeletion {
                        url,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            deleted = report.deleted.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "Asset cleanup finished"
        );

        report
    }
}
