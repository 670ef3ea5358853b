//! Blob storage abstraction for satchel.
//!
//! Content parts and thumbnails are stored as opaque blobs behind the
//! [`ObjectStore`] trait. The catalog owns ordering and metadata; this
//! crate only moves bytes.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use traits::{ByteStream, ObjectMeta, ObjectStore};

use satchel_core::config::StorageConfig;
use std::sync::Arc;

/// Create a storage backend from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend) as Arc<dyn ObjectStore>)
        }
    }
}

/// Blob key for a content part.
pub fn part_key(record_id: &satchel_core::record::RecordId, sequence: u32) -> String {
    format!(
        "records/{record_id}/parts/{}",
        satchel_core::record::format_part_sequence(sequence)
    )
}

/// Blob key for a record's thumbnail.
pub fn thumb_key(record_id: &satchel_core::record::RecordId) -> String {
    format!("records/{record_id}/thumb")
}

/// Blob key prefix covering every blob of a record.
pub fn record_prefix(record_id: &satchel_core::record::RecordId) -> String {
    format!("records/{record_id}")
}
