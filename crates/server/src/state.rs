//! Shared application state.

use satchel_core::config::AppConfig;
use satchel_metadata::CatalogStore;
use satchel_storage::ObjectStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Blob storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Catalog store.
    pub catalog: Arc<dyn CatalogStore>,
    /// In-flight append tracking.
    pub appends: AppendGuard,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        config: Arc<AppConfig>,
        storage: Arc<dyn ObjectStore>,
        catalog: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            config,
            storage,
            catalog,
            appends: AppendGuard::new(),
        }
    }
}

/// Tracks records with an append in flight. At most one writer may append
/// to a record at a time; a second concurrent append is rejected rather
/// than interleaved.
#[derive(Clone, Default)]
pub struct AppendGuard {
    inflight: Arc<Mutex<HashSet<Uuid>>>,
}

impl AppendGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim the record for an append. Returns `None` if another
    /// append is already in flight.
    pub fn try_acquire(&self, record_id: Uuid) -> Option<AppendPermit> {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if inflight.insert(record_id) {
            Some(AppendPermit {
                guard: self.clone(),
                record_id,
            })
        } else {
            None
        }
    }

    fn release(&self, record_id: Uuid) {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        inflight.remove(&record_id);
    }
}

/// Claim on a record's append slot. Released on drop, including on error
/// paths through `?`.
pub struct AppendPermit {
    guard: AppendGuard,
    record_id: Uuid,
}

impl Drop for AppendPermit {
    fn drop(&mut self) {
        self.guard.release(self.record_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_rejected_until_release() {
        let guard = AppendGuard::new();
        let id = Uuid::new_v4();

        let permit = guard.try_acquire(id).unwrap();
        assert!(guard.try_acquire(id).is_none());

        // A different record is unaffected.
        let other = guard.try_acquire(Uuid::new_v4());
        assert!(other.is_some());

        drop(permit);
        assert!(guard.try_acquire(id).is_some());
    }
}
