//! Chunked upload endpoint.

use crate::auth::{require_identity, Identity};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Multipart, Request, State};
use axum::http::StatusCode;
use axum::{Json, RequestExt};
use bytes::Bytes;
use satchel_core::record::{
    parse_part_sequence, Owner, PartRef, RecordId, RecordKind, Visibility,
};
use satchel_core::sync::SyncScope;
use satchel_core::transfer::UploadResponse;
use satchel_metadata::{AppendOutcome, NewRecord};

/// Parsed multipart upload form.
#[derive(Default)]
struct UploadForm {
    part: Option<Bytes>,
    target_record_id: Option<RecordId>,
    part_sequence: Option<u32>,
    total_size: Option<u64>,
    display_name: Option<String>,
    visibility: Option<Visibility>,
    scope: Option<SyncScope>,
}

impl UploadForm {
    async fn parse(mut multipart: Multipart, max_part_size: u64) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "part" => {
                    let data = field.bytes().await.map_err(|e| {
                        ApiError::BadRequest(format!("failed to read part bytes: {e}"))
                    })?;
                    if data.len() as u64 > max_part_size {
                        return Err(ApiError::PayloadTooLarge {
                            limit: max_part_size,
                        });
                    }
                    form.part = Some(data);
                }
                "target_record_id" => {
                    let text = text_field(field).await?;
                    form.target_record_id = Some(RecordId::parse(&text)?);
                }
                "part_sequence" => {
                    let text = text_field(field).await?;
                    form.part_sequence = Some(parse_part_sequence(&text)?);
                }
                "total_size" => {
                    let text = text_field(field).await?;
                    form.total_size = Some(text.parse().map_err(|_| {
                        ApiError::BadRequest(format!("invalid total_size: {text}"))
                    })?);
                }
                "display_name" => {
                    form.display_name = Some(text_field(field).await?);
                }
                "visibility" => {
                    let text = text_field(field).await?;
                    form.visibility = Some(Visibility::parse(&text)?);
                }
                "scope" => {
                    let text = text_field(field).await?;
                    form.scope = Some(SyncScope::parse(&text)?);
                }
                other => {
                    tracing::debug!(field = other, "ignoring unknown upload field");
                }
            }
        }

        Ok(form)
    }
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read form field: {e}")))
}

/// POST /v1/uploads
///
/// One part per request. Without `target_record_id` the request creates a
/// record from its first part (201); with one it appends (200). Ordering is
/// the caller-assigned sequence number, never arrival order. Re-delivery
/// of an applied sequence is a no-op returning the current version.
pub async fn upload(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let identity = require_identity(&req)?;
    let multipart: Multipart = req
        .extract()
        .await
        .map_err(|e| ApiError::BadRequest(format!("expected multipart body: {e}")))?;

    let max_part_size = state.config.server.max_part_size;
    let mut form = UploadForm::parse(multipart, max_part_size).await?;

    let part = form
        .part
        .take()
        .ok_or_else(|| ApiError::BadRequest("missing part field".to_string()))?;
    let sequence = form
        .part_sequence
        .ok_or_else(|| ApiError::BadRequest("missing part_sequence field".to_string()))?;

    match form.target_record_id {
        Some(record_id) => append_part(&state, identity, record_id, sequence, part).await,
        None => create_record(&state, identity, form, sequence, part).await,
    }
}

async fn create_record(
    state: &AppState,
    identity: Identity,
    form: UploadForm,
    sequence: u32,
    part: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let display_name = form
        .display_name
        .ok_or_else(|| ApiError::BadRequest("missing display_name field".to_string()))?;
    let total_size = form
        .total_size
        .ok_or_else(|| ApiError::BadRequest("missing total_size field".to_string()))?;

    let owner = match form.scope.unwrap_or(SyncScope::Individual) {
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

    let record_id = RecordId::new();
    let blob_key = satchel_storage::part_key(&record_id, sequence);
    state.storage.put(&blob_key, part.clone()).await?;

    let new = NewRecord {
        record_id,
        owner,
        parent_folder: None,
        kind: RecordKind::File {
            display_name,
            total_size,
        },
        visibility: form.visibility.unwrap_or(Visibility::Private),
        first_part: Some(PartRef {
            sequence,
            blob_key: blob_key.clone(),
            size: part.len() as u64,
        }),
    };

    let version = match state.catalog.create_record(new).await {
        Ok(version) => version,
        Err(e) => {
            // The catalog row is the source of truth; an orphaned blob is
            // cleaned up so retries start fresh.
            let _ = state.storage.delete(&blob_key).await;
            return Err(e.into());
        }
    };

    tracing::info!(record_id = %record_id, version, size = part.len(), "record created");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse { record_id, version }),
    ))
}

async fn append_part(
    state: &AppState,
    identity: Identity,
    record_id: RecordId,
    sequence: u32,
    part: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    // Claim the append slot before reading the record, so the snapshot
    // below cannot go stale under a racing writer. A duplicate delivery
    // must see the winner's part and leave its blob untouched.
    let _permit = state
        .appends
        .try_acquire(*record_id.as_uuid())
        .ok_or_else(|| {
            ApiError::Conflict(format!("another append to {record_id} is in flight"))
        })?;

    let record = state
        .catalog
        .get_record(record_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("record {record_id}")))?;

    // Ownership mismatch is fatal for the whole transfer; the client must
    // not retry against this record.
    if !identity.can_modify(&record) {
        return Err(ApiError::Forbidden(format!(
            "not an owner of record {record_id}"
        )));
    }
    if !record.kind.is_file() {
        return Err(ApiError::BadRequest(format!(
            "record {record_id} is not a file"
        )));
    }

    // Re-delivered sequence: report the current version, touch nothing.
    if record.has_part(sequence) {
        tracing::debug!(record_id = %record_id, sequence, "duplicate part ignored");
        return Ok((
            StatusCode::OK,
            Json(UploadResponse {
                record_id,
                version: record.version,
            }),
        ));
    }

    let blob_key = satchel_storage::part_key(&record_id, sequence);
    state.storage.put(&blob_key, part.clone()).await?;

    let outcome = match state
        .catalog
        .append_part(record_id, sequence, &blob_key, part.len() as u64)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            // The catalog row is the source of truth; sweep the orphaned
            // blob so a retry starts fresh, same as the create path.
            let _ = state.storage.delete(&blob_key).await;
            return Err(e.into());
        }
    };
    let version = match outcome {
        AppendOutcome::Applied { version } => version,
        AppendOutcome::AlreadyApplied { version } => version,
    };

    tracing::info!(record_id = %record_id, sequence, version, size = part.len(), "part appended");
    Ok((
        StatusCode::OK,
        Json(UploadResponse { record_id, version }),
    ))
}
