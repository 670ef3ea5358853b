//! Delta sync protocol wire types.

use crate::error::{Error, Result};
use crate::record::{Record, Tombstone};
use serde::{Deserialize, Serialize};

/// Ownership scope for a sync request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncScope {
    Individual,
    Team,
}

impl SyncScope {
    /// Parse from the wire string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "individual" => Ok(Self::Individual),
            "team" => Ok(Self::Team),
            other => Err(Error::InvalidScope(other.to_string())),
        }
    }
}

/// Outcome of a sync decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Client state is unusable; discard the mirror and re-fetch the full
    /// catalog via the listing interface.
    Reset,
    /// Client is already up to date.
    None,
    /// Incremental batch follows.
    Delta,
}

/// Client sync request. `last_applied_version` is untrusted input.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub last_applied_version: i64,
    pub scope: SyncScope,
}

/// Coordinator response.
///
/// `records` and `tombstones` are present only for `Delta`. A client applies
/// the batch by upserting every record and removing every tombstoned entity,
/// then advances its cursor to `server_version` — atomically, never past a
/// partially applied batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub status: SyncStatus,
    pub server_version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Record>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tombstones: Option<Vec<Tombstone>>,
}

impl SyncResponse {
    /// A reset response carrying the current server version.
    pub fn reset(server_version: i64) -> Self {
        Self {
            status: SyncStatus::Reset,
            server_version,
            records: None,
            tombstones: None,
        }
    }

    /// A no-updates response.
    pub fn none(server_version: i64) -> Self {
        Self {
            status: SyncStatus::None,
            server_version,
            records: None,
            tombstones: None,
        }
    }

    /// A delta batch response.
    pub fn delta(server_version: i64, records: Vec<Record>, tombstones: Vec<Tombstone>) -> Self {
        Self {
            status: SyncStatus::Delta,
            server_version,
            records: Some(records),
            tombstones: Some(tombstones),
        }
    }
}
