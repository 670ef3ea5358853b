//! Object storage trait.
//!
//! Blobs are opaque content parts keyed as `records/{record_id}/parts/{seq}`
//! (plus `records/{record_id}/thumb` for rendered previews). Backends never
//! interpret the bytes; ordering and metadata live in the catalog.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use time::OffsetDateTime;

/// A stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Blob metadata.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, if the backend tracks one.
    pub last_modified: Option<OffsetDateTime>,
}

/// Abstraction over blob storage backends.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check if a blob exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get blob metadata without fetching the content.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Fetch a blob fully into memory. Only for small blobs (thumbnails);
    /// content parts go through `get_stream`.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Open a blob as a chunked byte stream.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Store a blob. Replaces any existing blob under the key atomically.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Delete a blob. Missing blobs are an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Delete every blob under a key prefix. Missing prefixes are a no-op;
    /// record deletion calls this after the tombstone is already durable.
    async fn delete_prefix(&self, prefix: &str) -> StorageResult<()>;

    /// Verify the backend is reachable and writable.
    async fn health_check(&self) -> StorageResult<()>;

    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;
}
