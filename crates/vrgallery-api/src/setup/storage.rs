//! Storage setup and initialization

use anyhow::{Context, Result};
use vrgallery_core::Config;
use vrgallery_storage::{select_storage, StorageSelection};

/// Select the write backend and the resolvers for older URLs.
pub async fn setup_storage(config: &Config) -> Result<StorageSelection> {
    tracing::info!("Initializing storage abstraction...");
    let selection = select_storage(config)
        .await
        .context("No storage backend is usable")?;

    tracing::info!(
        backend = %selection.primary.backend_type(),
        resolvers = selection.resolvers.len(),
        "Storage abstraction initialized successfully"
    );

    Ok(selection)
}
