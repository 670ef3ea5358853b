//! Catalog store trait and SQLite implementation.
//!
//! Every tracked mutation runs in one transaction that increments the
//! version counter, stamps the mutated entity with the fresh value, and
//! commits — or rolls back entirely. If the counter increment fails the
//! mutation aborts; versions may be skipped but are never reused or
//! misordered.

use crate::error::{CatalogError, CatalogResult};
use crate::models::{PartRow, PrincipalRow, RecordRow, TombstoneRow};
use async_trait::async_trait;
use satchel_core::record::{Owner, PartRef, Record, RecordId, RecordKind, Tombstone, Visibility};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Fields for creating a record.
#[derive(Clone, Debug)]
pub struct NewRecord {
    pub record_id: RecordId,
    pub owner: Owner,
    pub parent_folder: Option<RecordId>,
    pub kind: RecordKind,
    pub visibility: Visibility,
    /// First content part, present for file creation via chunked upload.
    pub first_part: Option<PartRef>,
}

/// Outcome of appending a part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The part was applied and the record stamped with a fresh version.
    Applied { version: i64 },
    /// The sequence number was already applied; nothing changed and no
    /// version was minted (idempotent re-delivery).
    AlreadyApplied { version: i64 },
}

impl AppendOutcome {
    /// The record version after the call.
    pub fn version(&self) -> i64 {
        match self {
            Self::Applied { version } | Self::AlreadyApplied { version } => *version,
        }
    }
}

/// Catalog store: version counter, records, tombstones, principals.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Run schema migrations.
    async fn migrate(&self) -> CatalogResult<()>;

    /// Check store connectivity.
    async fn health_check(&self) -> CatalogResult<()>;

    /// Ensure the version counter row exists (bootstrap; idempotent).
    async fn ensure_counter(&self) -> CatalogResult<()>;

    /// Read the current server version without minting a new one.
    async fn current_version(&self) -> CatalogResult<i64>;

    /// Create a record, stamping it with a freshly minted version.
    /// Returns that version.
    async fn create_record(&self, new: NewRecord) -> CatalogResult<i64>;

    /// Fetch a record with its parts ordered by sequence number.
    async fn get_record(&self, record_id: RecordId) -> CatalogResult<Option<Record>>;

    /// Append a part to an existing record. Re-delivery of an applied
    /// sequence is a no-op. Does not check ownership; callers do.
    async fn append_part(
        &self,
        record_id: RecordId,
        sequence: u32,
        blob_key: &str,
        size: u64,
    ) -> CatalogResult<AppendOutcome>;

    /// Change a record's visibility (metadata-only mutation; still mints a
    /// version so cache validators and sync observe it). Returns the version.
    async fn set_visibility(
        &self,
        record_id: RecordId,
        visibility: Visibility,
    ) -> CatalogResult<i64>;

    /// Delete a record: one transaction mints a version, writes the
    /// immutable tombstone, and removes the record and its part rows.
    async fn delete_record(&self, record_id: RecordId) -> CatalogResult<Tombstone>;

    /// Full catalog for an owner (the listing a reset client re-fetches).
    async fn list_records(&self, owner: Owner) -> CatalogResult<Vec<Record>>;

    /// Records with `version > since` for an owner, ascending by version.
    async fn list_records_since(&self, since: i64, owner: Owner) -> CatalogResult<Vec<Record>>;

    /// Tombstones with `version > since` for an owner, ascending by version.
    async fn list_tombstones_since(
        &self,
        since: i64,
        owner: Owner,
    ) -> CatalogResult<Vec<Tombstone>>;

    /// Resolve a principal by token hash.
    async fn get_principal(&self, token_hash: &str) -> CatalogResult<Option<PrincipalRow>>;

    /// Register a principal.
    async fn create_principal(&self, principal: &PrincipalRow) -> CatalogResult<()>;
}

/// SQLite-backed catalog store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS version_counter (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    value INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS records (
    record_id BLOB PRIMARY KEY,
    owner_kind TEXT NOT NULL,
    owner_id BLOB NOT NULL,
    parent_folder BLOB,
    kind TEXT NOT NULL,
    display_name TEXT,
    total_size INTEGER,
    visibility TEXT NOT NULL,
    version INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_records_version ON records(version);
CREATE INDEX IF NOT EXISTS idx_records_owner ON records(owner_kind, owner_id);

CREATE TABLE IF NOT EXISTS record_parts (
    record_id BLOB NOT NULL REFERENCES records(record_id) ON DELETE CASCADE,
    sequence INTEGER NOT NULL,
    blob_key TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    received_at TEXT NOT NULL,
    PRIMARY KEY (record_id, sequence)
);

CREATE TABLE IF NOT EXISTS tombstones (
    entity_id BLOB PRIMARY KEY,
    owner_kind TEXT NOT NULL,
    owner_id BLOB NOT NULL,
    version INTEGER NOT NULL,
    deleted_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tombstones_version ON tombstones(version);
CREATE INDEX IF NOT EXISTS idx_tombstones_owner ON tombstones(owner_kind, owner_id);

CREATE TABLE IF NOT EXISTS principals (
    token_hash TEXT PRIMARY KEY,
    user_id BLOB NOT NULL,
    team_id BLOB,
    created_at TEXT NOT NULL
);
"#;

impl SqliteStore {
    /// Create a new SQLite store and run migrations.
    pub async fn new(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writes, which is exactly the
            // contention model the version counter imposes anyway.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Mint the next version inside `tx`. Failure here must abort the
    /// enclosing mutation.
    async fn bump_version(tx: &mut Transaction<'_, Sqlite>) -> CatalogResult<i64> {
        let version: Option<i64> = sqlx::query_scalar(
            "UPDATE version_counter SET value = value + 1 WHERE id = 1 RETURNING value",
        )
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| CatalogError::Counter(e.to_string()))?;

        version.ok_or_else(|| CatalogError::Counter("counter row missing".to_string()))
    }

    async fn load_parts(&self, record_id: Uuid) -> CatalogResult<Vec<PartRow>> {
        let parts = sqlx::query_as::<_, PartRow>(
            "SELECT * FROM record_parts WHERE record_id = ? ORDER BY sequence ASC",
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(parts)
    }

    async fn assemble(&self, rows: Vec<RecordRow>) -> CatalogResult<Vec<Record>> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let parts = self.load_parts(row.record_id).await?;
            records.push(row.into_record(parts)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn migrate(&self) -> CatalogResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> CatalogResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn ensure_counter(&self) -> CatalogResult<()> {
        sqlx::query("INSERT INTO version_counter (id, value) VALUES (1, 0) ON CONFLICT DO NOTHING")
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Counter(e.to_string()))?;
        Ok(())
    }

    async fn current_version(&self) -> CatalogResult<i64> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT value FROM version_counter WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CatalogError::Counter(e.to_string()))?;
        version.ok_or_else(|| CatalogError::Counter("counter row missing".to_string()))
    }

    async fn create_record(&self, new: NewRecord) -> CatalogResult<i64> {
        let record_id = *new.record_id.as_uuid();
        let now = OffsetDateTime::now_utc();

        let (display_name, total_size) = match &new.kind {
            RecordKind::File {
                display_name,
                total_size,
            } => (Some(display_name.clone()), Some(*total_size as i64)),
            RecordKind::Folder => (None, None),
        };

        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM records WHERE record_id = ?")
            .bind(record_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_some() {
            return Err(CatalogError::AlreadyExists(format!(
                "record {record_id} already exists"
            )));
        }

        let version = Self::bump_version(&mut tx).await?;

        sqlx::query(
            "INSERT INTO records \
             (record_id, owner_kind, owner_id, parent_folder, kind, display_name, total_size, \
              visibility, version, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record_id)
        .bind(new.owner.kind_str())
        .bind(new.owner.id())
        .bind(new.parent_folder.map(|p| *p.as_uuid()))
        .bind(new.kind.kind_str())
        .bind(display_name)
        .bind(total_size)
        .bind(new.visibility.as_str())
        .bind(version)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if let Some(part) = new.first_part {
            sqlx::query(
                "INSERT INTO record_parts (record_id, sequence, blob_key, size_bytes, received_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(record_id)
            .bind(part.sequence as i64)
            .bind(&part.blob_key)
            .bind(part.size as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(record_id = %record_id, version, "record created");
        Ok(version)
    }

    async fn get_record(&self, record_id: RecordId) -> CatalogResult<Option<Record>> {
        let row = sqlx::query_as::<_, RecordRow>("SELECT * FROM records WHERE record_id = ?")
            .bind(*record_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let parts = self.load_parts(row.record_id).await?;
                Ok(Some(row.into_record(parts)?))
            }
            None => Ok(None),
        }
    }

    async fn append_part(
        &self,
        record_id: RecordId,
        sequence: u32,
        blob_key: &str,
        size: u64,
    ) -> CatalogResult<AppendOutcome> {
        let id = *record_id.as_uuid();
        let now = OffsetDateTime::now_utc();

        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar("SELECT version FROM records WHERE record_id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let current = current
            .ok_or_else(|| CatalogError::NotFound(format!("record {record_id} not found")))?;

        let applied: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM record_parts WHERE record_id = ? AND sequence = ?",
        )
        .bind(id)
        .bind(sequence as i64)
        .fetch_optional(&mut *tx)
        .await?;
        if applied.is_some() {
            // Idempotent re-delivery: no new version, no change.
            return Ok(AppendOutcome::AlreadyApplied { version: current });
        }

        let version = Self::bump_version(&mut tx).await?;

        sqlx::query(
            "INSERT INTO record_parts (record_id, sequence, blob_key, size_bytes, received_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(sequence as i64)
        .bind(blob_key)
        .bind(size as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE records SET version = ?, updated_at = ? WHERE record_id = ?")
            .bind(version)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(record_id = %record_id, sequence, version, "part appended");
        Ok(AppendOutcome::Applied { version })
    }

    async fn set_visibility(
        &self,
        record_id: RecordId,
        visibility: Visibility,
    ) -> CatalogResult<i64> {
        let id = *record_id.as_uuid();
        let now = OffsetDateTime::now_utc();

        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM records WHERE record_id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(CatalogError::NotFound(format!(
                "record {record_id} not found"
            )));
        }

        let version = Self::bump_version(&mut tx).await?;

        sqlx::query(
            "UPDATE records SET visibility = ?, version = ?, updated_at = ? WHERE record_id = ?",
        )
        .bind(visibility.as_str())
        .bind(version)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(version)
    }

    async fn delete_record(&self, record_id: RecordId) -> CatalogResult<Tombstone> {
        let id = *record_id.as_uuid();
        let now = OffsetDateTime::now_utc();

        let mut tx = self.pool.begin().await?;

        let row: Option<(String, Uuid)> =
            sqlx::query_as("SELECT owner_kind, owner_id FROM records WHERE record_id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let (owner_kind, owner_id) = row
            .ok_or_else(|| CatalogError::NotFound(format!("record {record_id} not found")))?;
        let owner = Owner::from_parts(&owner_kind, owner_id)
            .map_err(|e| CatalogError::Internal(format!("corrupt owner column: {e}")))?;

        let version = Self::bump_version(&mut tx).await?;

        sqlx::query(
            "INSERT INTO tombstones (entity_id, owner_kind, owner_id, version, deleted_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(owner.kind_str())
        .bind(owner.id())
        .bind(version)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM record_parts WHERE record_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM records WHERE record_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(record_id = %record_id, version, "record deleted, tombstone written");

        Ok(Tombstone {
            entity_id: record_id,
            owner,
            version,
            deleted_at: now,
        })
    }

    async fn list_records(&self, owner: Owner) -> CatalogResult<Vec<Record>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT * FROM records WHERE owner_kind = ? AND owner_id = ? ORDER BY version ASC",
        )
        .bind(owner.kind_str())
        .bind(owner.id())
        .fetch_all(&self.pool)
        .await?;
        self.assemble(rows).await
    }

    async fn list_records_since(&self, since: i64, owner: Owner) -> CatalogResult<Vec<Record>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT * FROM records \
             WHERE version > ? AND owner_kind = ? AND owner_id = ? ORDER BY version ASC",
        )
        .bind(since)
        .bind(owner.kind_str())
        .bind(owner.id())
        .fetch_all(&self.pool)
        .await?;
        self.assemble(rows).await
    }

    async fn list_tombstones_since(
        &self,
        since: i64,
        owner: Owner,
    ) -> CatalogResult<Vec<Tombstone>> {
        let rows = sqlx::query_as::<_, TombstoneRow>(
            "SELECT * FROM tombstones \
             WHERE version > ? AND owner_kind = ? AND owner_id = ? ORDER BY version ASC",
        )
        .bind(since)
        .bind(owner.kind_str())
        .bind(owner.id())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_tombstone()).collect()
    }

    async fn get_principal(&self, token_hash: &str) -> CatalogResult<Option<PrincipalRow>> {
        let row =
            sqlx::query_as::<_, PrincipalRow>("SELECT * FROM principals WHERE token_hash = ?")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn create_principal(&self, principal: &PrincipalRow) -> CatalogResult<()> {
        sqlx::query(
            "INSERT INTO principals (token_hash, user_id, team_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&principal.token_hash)
        .bind(principal.user_id)
        .bind(principal.team_id)
        .bind(principal.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                CatalogError::AlreadyExists(format!("principal {}", principal.token_hash))
            }
            other => CatalogError::Database(other),
        })?;
        Ok(())
    }
}
