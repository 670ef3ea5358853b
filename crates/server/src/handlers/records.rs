//! Record listing, metadata, and deletion.

use crate::auth::{can_read, get_identity, require_identity};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, Request, State};
use axum::{Json, RequestExt};
use satchel_core::record::{Owner, Record, RecordId, Visibility};
use satchel_core::sync::SyncScope;
use satchel_core::transfer::{DeleteResponse, ListingResponse, UploadResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub scope: Option<String>,
}

/// GET /v1/records
///
/// Scope-filtered full catalog plus the current server version. This is
/// the full fetch a client performs after a sync reset.
pub async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    req: Request,
) -> ApiResult<Json<ListingResponse>> {
    let identity = require_identity(&req)?;

    let scope = match query.scope.as_deref() {
        Some(s) => SyncScope::parse(s)?,
        None => SyncScope::Individual,
    };
    let owner = match scope {
        SyncScope::Individual => Owner::User(identity.user_id),
        SyncScope::Team => match identity.team_id {
            Some(team_id) => Owner::Team(team_id),
            None => {
                return Err(ApiError::BadRequest(
                    "team scope requires team membership".to_string(),
                ))
            }
        },
    };

    let server_version = state.catalog.current_version().await?;
    let records = state.catalog.list_records(owner).await?;

    Ok(Json(ListingResponse {
        server_version,
        records,
    }))
}

/// GET /v1/records/{id}
///
/// Record metadata, same access rule as content reads.
pub async fn get_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    req: Request,
) -> ApiResult<Json<Record>> {
    let record_id = RecordId::parse(&record_id)?;
    let record = state
        .catalog
        .get_record(record_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("record {record_id}")))?;

    if record.visibility == Visibility::Private {
        match get_identity(&req) {
            None => {
                return Err(ApiError::AuthenticationRequired(
                    "private record requires identity".to_string(),
                ))
            }
            Some(identity) if can_read(&identity, &record) => {}
            Some(_) => {
                return Err(ApiError::Forbidden(format!(
                    "no access to record {record_id}"
                )))
            }
        }
    }

    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest {
    pub visibility: Visibility,
}

/// PATCH /v1/records/{id}
///
/// Owner-only visibility change. Metadata-only, but it still mints a
/// version so sync clients and cache validators observe it.
pub async fn update_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    req: Request,
) -> ApiResult<Json<UploadResponse>> {
    let identity = require_identity(&req)?;
    let record_id = RecordId::parse(&record_id)?;
    let Json(body): Json<UpdateRecordRequest> = req
        .extract()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;

    let record = state
        .catalog
        .get_record(record_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("record {record_id}")))?;
    if !identity.can_modify(&record) {
        return Err(ApiError::Forbidden(format!(
            "not an owner of record {record_id}"
        )));
    }

    let version = state.catalog.set_visibility(record_id, body.visibility).await?;

    tracing::info!(
        record_id = %record_id,
        visibility = body.visibility.as_str(),
        version,
        "visibility updated"
    );
    Ok(Json(UploadResponse { record_id, version }))
}

/// DELETE /v1/records/{id}
///
/// Owner-only. The catalog transaction mints a version, writes the
/// tombstone, and removes the record; blobs are cleaned up afterwards
/// best-effort. A failed blob sweep never undoes the tombstone.
pub async fn delete_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    req: Request,
) -> ApiResult<Json<DeleteResponse>> {
    let identity = require_identity(&req)?;
    let record_id = RecordId::parse(&record_id)?;

    let record = state
        .catalog
        .get_record(record_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("record {record_id}")))?;
    if !identity.can_modify(&record) {
        return Err(ApiError::Forbidden(format!(
            "not an owner of record {record_id}"
        )));
    }

    let tombstone = state.catalog.delete_record(record_id).await?;

    let prefix = satchel_storage::record_prefix(&record_id);
    if let Err(e) = state.storage.delete_prefix(&prefix).await {
        tracing::warn!(record_id = %record_id, error = %e, "blob cleanup failed after delete");
    }

    tracing::info!(record_id = %record_id, version = tombstone.version, "record deleted");
    Ok(Json(DeleteResponse {
        entity_id: tombstone.entity_id,
        version: tombstone.version,
    }))
}
