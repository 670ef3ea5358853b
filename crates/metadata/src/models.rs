//! Database rows mapping to the catalog schema.

use crate::error::{CatalogError, CatalogResult};
use satchel_core::record::{Owner, PartRef, Record, RecordId, RecordKind, Tombstone, Visibility};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Record row. Kind-specific columns are nullable; `kind` discriminates.
#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    pub record_id: Uuid,
    pub owner_kind: String,
    pub owner_id: Uuid,
    pub parent_folder: Option<Uuid>,
    pub kind: String,
    pub display_name: Option<String>,
    pub total_size: Option<i64>,
    pub visibility: String,
    pub version: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Content part row. Ordering is by the numeric `sequence` column.
#[derive(Debug, Clone, FromRow)]
pub struct PartRow {
    pub record_id: Uuid,
    pub sequence: i64,
    pub blob_key: String,
    pub size_bytes: i64,
    pub received_at: OffsetDateTime,
}

/// Tombstone row. Immutable once written.
#[derive(Debug, Clone, FromRow)]
pub struct TombstoneRow {
    pub entity_id: Uuid,
    pub owner_kind: String,
    pub owner_id: Uuid,
    pub version: i64,
    pub deleted_at: OffsetDateTime,
}

/// Principal row for the identity resolver.
#[derive(Debug, Clone, FromRow)]
pub struct PrincipalRow {
    pub token_hash: String,
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

impl RecordRow {
    /// Assemble a domain record from this row and its ordered parts.
    pub fn into_record(self, parts: Vec<PartRow>) -> CatalogResult<Record> {
        let owner = Owner::from_parts(&self.owner_kind, self.owner_id)
            .map_err(|e| CatalogError::Internal(format!("corrupt owner column: {e}")))?;
        let visibility = Visibility::parse(&self.visibility)
            .map_err(|e| CatalogError::Internal(format!("corrupt visibility column: {e}")))?;

        let kind = match self.kind.as_str() {
            "file" => RecordKind::File {
                display_name: self.display_name.unwrap_or_default(),
                total_size: self.total_size.unwrap_or(0).max(0) as u64,
            },
            "folder" => RecordKind::Folder,
            other => {
                return Err(CatalogError::Internal(format!(
                    "corrupt kind column: {other}"
                )))
            }
        };

        let parts = parts
            .into_iter()
            .map(|p| PartRef {
                sequence: p.sequence.max(0) as u32,
                blob_key: p.blob_key,
                size: p.size_bytes.max(0) as u64,
            })
            .collect();

        Ok(Record {
            id: RecordId::from(self.record_id),
            owner,
            parent_folder: self.parent_folder.map(RecordId::from),
            kind,
            visibility,
            parts,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TombstoneRow {
    /// Convert to the domain tombstone.
    pub fn into_tombstone(self) -> CatalogResult<Tombstone> {
        let owner = Owner::from_parts(&self.owner_kind, self.owner_id)
            .map_err(|e| CatalogError::Internal(format!("corrupt owner column: {e}")))?;
        Ok(Tombstone {
            entity_id: RecordId::from(self.entity_id),
            owner,
            version: self.version,
            deleted_at: self.deleted_at,
        })
    }
}
