//! Record, tombstone, and ownership types.
//!
//! A [`Record`] is the unit of synchronization: a tracked file or folder with
//! ownership, visibility, and a version stamped from the catalog's logical
//! clock at its last mutation. A [`Tombstone`] is the immutable marker left
//! behind when a record is deleted, carrying the version at deletion time so
//! sync clients can replay the removal.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum digits accepted in a wire part sequence number.
const MAX_SEQUENCE_DIGITS: usize = 9;

/// Unique identifier for a record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a new random record ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidRecordId(format!("{s}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for RecordId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The owning principal of a record: an individual user or a team.
///
/// Ownership is immutable after record creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Owner {
    User(Uuid),
    Team(Uuid),
}

impl Owner {
    /// The storage discriminant for this owner kind.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Team(_) => "team",
        }
    }

    /// The owning principal's UUID.
    pub fn id(&self) -> Uuid {
        match self {
            Self::User(id) | Self::Team(id) => *id,
        }
    }

    /// Reassemble an owner from its stored parts.
    pub fn from_parts(kind: &str, id: Uuid) -> Result<Self> {
        match kind {
            "user" => Ok(Self::User(id)),
            "team" => Ok(Self::Team(id)),
            other => Err(Error::InvalidOwner(other.to_string())),
        }
    }
}

/// Record visibility levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    Private,
    SharedView,
    SharedEdit,
    Team,
}

impl Visibility {
    /// The storage string for this visibility.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::SharedView => "shared-view",
            Self::SharedEdit => "shared-edit",
            Self::Team => "team",
        }
    }

    /// Parse from the storage string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "private" => Ok(Self::Private),
            "shared-view" => Ok(Self::SharedView),
            "shared-edit" => Ok(Self::SharedEdit),
            "team" => Ok(Self::Team),
            other => Err(Error::InvalidVisibility(other.to_string())),
        }
    }
}

/// Kind-specific record data.
///
/// Files and folders share the syncable-entity fields (id, owner, version);
/// everything specific to one kind lives in its variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum RecordKind {
    File {
        display_name: String,
        total_size: u64,
    },
    Folder,
}

impl RecordKind {
    /// The storage discriminant for this kind.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Folder => "folder",
        }
    }

    /// Whether this record carries content parts.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }
}

/// One contiguous byte-range chunk of a record's content.
///
/// Ordering is by the explicit `sequence` field, sorted numerically — never
/// by blob key comparison, since retries can reorder arrivals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRef {
    /// Caller-assigned position in the stitched object (0-indexed).
    pub sequence: u32,
    /// Blob key in object storage.
    pub blob_key: String,
    /// Part size in bytes.
    pub size: u64,
}

/// A tracked file or folder entity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    pub owner: Owner,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_folder: Option<RecordId>,
    #[serde(flatten)]
    pub kind: RecordKind,
    pub visibility: Visibility,
    /// Ordered content parts. Single-part objects have exactly one entry;
    /// folders have none.
    pub parts: Vec<PartRef>,
    /// Catalog counter value at the last mutation of this record.
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Record {
    /// Total content size as the sum of part sizes.
    pub fn content_length(&self) -> u64 {
        self.parts.iter().map(|p| p.size).sum()
    }

    /// Whether the given sequence number has already been applied.
    pub fn has_part(&self, sequence: u32) -> bool {
        self.parts.iter().any(|p| p.sequence == sequence)
    }
}

/// Immutable marker recording a record's deletion.
///
/// Written exactly once on delete and retained indefinitely: sync depends on
/// replaying all tombstones newer than any plausible client version.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    pub entity_id: RecordId,
    pub owner: Owner,
    /// Counter value minted for the deletion.
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub deleted_at: OffsetDateTime,
}

/// Parse a wire part sequence number.
///
/// The wire form is a zero-padded decimal string (e.g. `"00000003"`);
/// unpadded digits are accepted as well. Anything else is rejected so
/// ordering can never silently degrade to lexicographic comparison.
pub fn parse_part_sequence(s: &str) -> Result<u32> {
    if s.is_empty() || s.len() > MAX_SEQUENCE_DIGITS {
        return Err(Error::InvalidPartSequence(s.to_string()));
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidPartSequence(s.to_string()));
    }
    s.parse::<u32>()
        .map_err(|_| Error::InvalidPartSequence(s.to_string()))
}

/// Format a part sequence number in its zero-padded wire form.
pub fn format_part_sequence(sequence: u32) -> String {
    format!("{sequence:08}")
}
