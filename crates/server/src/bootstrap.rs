//! Startup bootstrap.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use satchel_core::retry::{retry_transient, RetryPolicy};

/// Prepare the catalog for serving: ensure the version counter row exists
/// and read the current version once.
///
/// The version read is the one critical startup read and the only place
/// with automatic retry; a transient database hiccup during a deploy
/// should not take the process down. Request paths never retry.
pub async fn bootstrap(state: &AppState) -> ApiResult<i64> {
    state.catalog.ensure_counter().await?;

    let catalog = state.catalog.clone();
    let version = retry_transient(
        RetryPolicy::default(),
        |e: &satchel_metadata::CatalogError| e.is_transient(),
        move || {
            let catalog = catalog.clone();
            async move { catalog.current_version().await }
        },
    )
    .await
    .map_err(ApiError::Catalog)?;

    tracing::info!(server_version = version, "catalog bootstrap complete");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_core::config::AppConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_bootstrap_seeds_counter_idempotently() {
        let temp = tempfile::tempdir().unwrap();
        let storage = satchel_storage::from_config(&satchel_core::config::StorageConfig::Filesystem {
            path: temp.path().join("blobs"),
        })
        .await
        .unwrap();
        let catalog = satchel_metadata::from_config(&satchel_core::config::CatalogConfig::Sqlite {
            path: temp.path().join("catalog.db"),
        })
        .await
        .unwrap();
        let state = AppState::new(Arc::new(AppConfig::for_testing()), storage, catalog);

        assert_eq!(bootstrap(&state).await.unwrap(), 0);
        // Re-running does not reseed or disturb the counter.
        assert_eq!(bootstrap(&state).await.unwrap(), 0);
    }
}
