//! Core domain types and shared logic for the satchel sync/transfer layer.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Record and tombstone entities with ownership and version metadata
//! - Part sequences for chunked object transfer
//! - Sync protocol wire types
//! - Media classification for the read path
//! - Configuration and the bounded retry helper

pub mod config;
pub mod error;
pub mod media;
pub mod record;
pub mod retry;
pub mod sync;
pub mod transfer;

pub use error::{Error, Result};
pub use record::{Owner, PartRef, Record, RecordId, RecordKind, Tombstone, Visibility};
pub use sync::{SyncRequest, SyncResponse, SyncScope, SyncStatus};
pub use transfer::{DeleteResponse, ListingResponse, UploadResponse};

/// Default maximum part size: 8 MiB.
pub const DEFAULT_MAX_PART_SIZE: u64 = 8 * 1024 * 1024;

/// Default staleness threshold: version gap beyond which a delta is refused
/// and a full resync is forced instead.
pub const DEFAULT_STALENESS_THRESHOLD: i64 = 1000;
