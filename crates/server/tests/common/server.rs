//! Server test utilities.

use satchel_core::config::{AppConfig, CatalogConfig, StorageConfig};
use satchel_metadata::models::PrincipalRow;
use satchel_metadata::{CatalogStore, SqliteStore};
use satchel_server::{create_router, AppState};
use satchel_storage::{FilesystemBackend, ObjectStore};
use std::sync::Arc;
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("blobs");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let db_path = temp_dir.path().join("catalog.db");
        let catalog: Arc<dyn CatalogStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create catalog store"),
        );
        catalog
            .ensure_counter()
            .await
            .expect("Failed to seed version counter");

        let mut config = AppConfig {
            server: Default::default(),
            storage: StorageConfig::Filesystem { path: storage_path },
            catalog: CatalogConfig::Sqlite { path: db_path },
        };
        modifier(&mut config);

        let state = AppState::new(Arc::new(config), storage, catalog);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying catalog.
    pub fn catalog(&self) -> Arc<dyn CatalogStore> {
        self.state.catalog.clone()
    }

    /// Register a principal and return the raw bearer token for it.
    pub async fn create_principal(&self, user_id: Uuid, team_id: Option<Uuid>) -> String {
        let token = format!("test-token-{}", Uuid::new_v4());
        let principal = PrincipalRow {
            token_hash: satchel_server::auth::hash_token(&token),
            user_id,
            team_id,
            created_at: OffsetDateTime::now_utc(),
        };
        self.state
            .catalog
            .create_principal(&principal)
            .await
            .expect("Failed to create principal");
        token
    }
}
