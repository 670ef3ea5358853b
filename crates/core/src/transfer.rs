//! Transfer and listing wire types.

use crate::record::{Record, RecordId};
use serde::{Deserialize, Serialize};

/// Response from accepting an upload part.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// The record the part was applied to (newly created on first part).
    pub record_id: RecordId,
    /// Record version after the mutation. Unchanged for an idempotent
    /// re-delivery of an already-applied sequence.
    pub version: i64,
}

/// Response from deleting a record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub entity_id: RecordId,
    /// Counter value minted for the deletion (matches the tombstone).
    pub version: i64,
}

/// Full catalog listing, used by clients re-fetching after a reset.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    /// Server version at the time of the listing; the client adopts this as
    /// its new cursor after materializing the records.
    pub server_version: i64,
    pub records: Vec<Record>,
}
