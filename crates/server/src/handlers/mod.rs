//! HTTP request handlers.

pub mod content;
pub mod records;
pub mod sync;
pub mod transfer;

pub use content::*;
pub use records::*;
pub use sync::*;
pub use transfer::*;

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(rename = "serverVersion")]
    pub server_version: i64,
}

/// GET /healthz
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.storage.health_check().await?;
    state.catalog.health_check().await?;
    let server_version = state.catalog.current_version().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        server_version,
    }))
}
