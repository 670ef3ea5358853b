//! Stitched content reads.

use crate::auth::{can_read, get_identity};
use crate::conditional::{etag_for, http_date, not_modified};
use crate::error::{ApiError, ApiResult};
use crate::shaper::throttle;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{
    CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED,
};
use axum::http::StatusCode;
use axum::response::Response;
use futures::StreamExt;
use satchel_core::media::{classify, disposition, Classification};
use satchel_core::record::{Record, RecordId, RecordKind};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ContentQuery {
    pub variant: Option<String>,
}

/// GET /v1/records/{id}/content
///
/// Streams the record's parts in sequence order as one body. Conditional
/// headers are evaluated against the catalog validator before any blob is
/// opened; a match answers 304 without touching storage.
pub async fn get_content(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    Query(query): Query<ContentQuery>,
    req: Request,
) -> ApiResult<Response> {
    let record_id = RecordId::parse(&record_id)?;
    let record = state
        .catalog
        .get_record(record_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("record {record_id}")))?;

    check_read_access(&req, &record)?;

    if not_modified(req.headers(), &record) {
        return not_modified_response(&record);
    }

    match query.variant.as_deref() {
        Some("thumbnail") => serve_thumbnail(&state, &record).await,
        Some(other) => Err(ApiError::BadRequest(format!("unknown variant: {other}"))),
        None => serve_content(&state, &record).await,
    }
}

/// Read access rule: anything not private is readable; private entities
/// only by their owner. Anonymous callers without a grant get 401 so they
/// can retry with credentials; identified callers without one get 403.
fn check_read_access(req: &Request, record: &Record) -> ApiResult<()> {
    if record.visibility != satchel_core::record::Visibility::Private {
        return Ok(());
    }
    match get_identity(req) {
        None => Err(ApiError::AuthenticationRequired(
            "private record requires identity".to_string(),
        )),
        Some(identity) if can_read(&identity, record) => Ok(()),
        Some(_) => Err(ApiError::Forbidden(format!(
            "no access to record {}",
            record.id
        ))),
    }
}

fn not_modified_response(record: &Record) -> ApiResult<Response> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(ETAG, etag_for(record))
        .header(LAST_MODIFIED, http_date(record.updated_at))
        .body(Body::empty())
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}

async fn serve_content(state: &AppState, record: &Record) -> ApiResult<Response> {
    let display_name = match &record.kind {
        RecordKind::File { display_name, .. } => display_name.clone(),
        RecordKind::Folder => {
            return Err(ApiError::BadRequest(format!(
                "record {} has no content",
                record.id
            )))
        }
    };

    let classification = classify(&display_name);
    let content_length = record.content_length();

    // One part open at a time; a mid-stream failure aborts the response.
    let storage = state.storage.clone();
    let parts = record.parts.clone();
    let stream = async_stream::try_stream! {
        for part in parts {
            let mut blob = storage.get_stream(&part.blob_key).await?;
            while let Some(chunk) = blob.next().await {
                yield chunk?;
            }
        }
    };

    let shaped = throttle(Box::pin(stream), state.config.server.download_rate_limit);

    build_content_response(record, classification, &display_name, content_length, shaped)
}

/// Thumbnails come from the rendering layer as a single small blob. They
/// are served inline and are exempt from throughput shaping.
async fn serve_thumbnail(state: &AppState, record: &Record) -> ApiResult<Response> {
    let key = satchel_storage::thumb_key(&record.id);
    let data = match state.storage.get(&key).await {
        Ok(data) => data,
        Err(satchel_storage::StorageError::NotFound(_)) => {
            return Err(ApiError::NotFound(format!(
                "no thumbnail for record {}",
                record.id
            )))
        }
        Err(e) => return Err(e.into()),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "image/jpeg")
        .header(CONTENT_LENGTH, data.len())
        .header(CONTENT_DISPOSITION, "inline")
        .header(ETAG, etag_for(record))
        .header(LAST_MODIFIED, http_date(record.updated_at))
        .body(Body::from(data))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}

fn build_content_response(
    record: &Record,
    classification: Classification,
    display_name: &str,
    content_length: u64,
    stream: satchel_storage::ByteStream,
) -> ApiResult<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, classification.content_type)
        .header(CONTENT_LENGTH, content_length)
        .header(CONTENT_DISPOSITION, disposition(classification, display_name))
        .header(ETAG, etag_for(record))
        .header(LAST_MODIFIED, http_date(record.updated_at))
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}
