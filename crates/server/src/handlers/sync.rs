//! Delta sync endpoint.

use crate::auth::require_identity;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::{Json, RequestExt};
use satchel_core::record::Owner;
use satchel_core::sync::{SyncRequest, SyncResponse, SyncScope};

/// POST /v1/sync
///
/// Compares the client's last applied version against the server version
/// and answers with one of three outcomes:
/// - `reset`: the cursor is unusable (forced resync, negative, ahead of the
///   server, or further behind than the staleness threshold). The client
///   discards local state and re-fetches the full catalog.
/// - `none`: the client is current.
/// - `delta`: records and tombstones with a version above the cursor.
///
/// A cursor of 0 means "never synced" and always takes the delta path with
/// the entire catalog; a fresh client is not stale, just empty.
pub async fn sync(State(state): State<AppState>, req: Request) -> ApiResult<Json<SyncResponse>> {
    let identity = require_identity(&req)?;
    let Json(body): Json<SyncRequest> = req
        .extract()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid sync request: {e}")))?;

    let owner = match body.scope {
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
    let cursor = body.last_applied_version;

    let needs_reset = state.config.server.force_resync
        || cursor < 0
        || cursor > server_version
        || (cursor > 0 && server_version - cursor > state.config.server.staleness_threshold);

    if needs_reset {
        tracing::info!(
            cursor,
            server_version,
            forced = state.config.server.force_resync,
            "sync cursor rejected, client must resync"
        );
        return Ok(Json(SyncResponse::reset(server_version)));
    }

    if cursor >= server_version {
        return Ok(Json(SyncResponse::none(server_version)));
    }

    let records = state.catalog.list_records_since(cursor, owner).await?;
    let tombstones = state.catalog.list_tombstones_since(cursor, owner).await?;

    tracing::debug!(
        cursor,
        server_version,
        records = records.len(),
        tombstones = tombstones.len(),
        "delta sync"
    );

    Ok(Json(SyncResponse::delta(
        server_version,
        records,
        tombstones,
    )))
}
