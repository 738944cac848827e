//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p vrgallery-api`.

pub mod fixtures;

use axum_test::TestServer;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use vrgallery_api::constants;
use vrgallery_api::setup::routes;
use vrgallery_api::state::AppState;
use vrgallery_core::Config;
use vrgallery_storage::{LocalStorage, Storage, StorageSelection};

pub const BASE_URL: &str = "http://localhost:3000";

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Test application: server and owned storage root.
pub struct TestApp {
    pub server: TestServer,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// On-disk path of a stored key.
    pub fn stored_path(&self, key: &str) -> std::path::PathBuf {
        self.temp_dir.path().join(key)
    }
}

pub fn create_test_config(storage_root: &std::path::Path) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("PUBLIC_BASE_URL", BASE_URL.to_string()),
        (
            "LOCAL_STORAGE_PATH",
            storage_root.to_string_lossy().into_owned(),
        ),
        ("STORAGE_TIMEOUT_SECS", "5".to_string()),
    ]);
    Config::from_lookup(|key| vars.get(key).cloned()).expect("valid test config")
}

/// Setup test app with local storage in a fresh temp directory.
pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = create_test_config(temp_dir.path());

    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(temp_dir.path(), BASE_URL)
            .await
            .expect("Failed to create local storage"),
    );
    let state = Arc::new(AppState::new(config, StorageSelection::single(storage)));

    let router = routes::setup_routes(state).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp { server, temp_dir }
}
