//! Catalog store abstraction and implementations for satchel.
//!
//! This crate provides the control-plane data model:
//! - The version counter (the catalog's single logical clock)
//! - Records and their ordered content parts
//! - Tombstones for deleted entities
//! - Principals for the identity resolver

pub mod error;
pub mod models;
pub mod store;

pub use error::{CatalogError, CatalogResult};
pub use store::{AppendOutcome, CatalogStore, NewRecord, SqliteStore};

use satchel_core::config::CatalogConfig;
use std::sync::Arc;

/// Create a catalog store from configuration.
pub async fn from_config(config: &CatalogConfig) -> CatalogResult<Arc<dyn CatalogStore>> {
    match config {
        CatalogConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn CatalogStore>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("catalog.db");
        let config = CatalogConfig::Sqlite {
            path: db_path.clone(),
        };

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
        assert!(db_path.exists());
    }
}
