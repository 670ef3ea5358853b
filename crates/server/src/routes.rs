//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Multipart framing overhead allowed on top of the part size limit.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let request_timeout = state.config.server.request_timeout();
    let upload_timeout = state.config.server.upload_timeout();
    let body_limit = (state.config.server.max_part_size + MULTIPART_OVERHEAD) as usize;

    // Uploads get a long deadline; a part transfer over a slow link takes
    // minutes. Everything else answers fast and gets the short one.
    let upload_routes = Router::new()
        .route("/v1/uploads", post(handlers::upload))
        .layer(TimeoutLayer::new(upload_timeout))
        .layer(DefaultBodyLimit::max(body_limit));

    let api_routes = Router::new()
        // Health check, intentionally unauthenticated for probes
        .route("/healthz", get(handlers::health))
        .route("/v1/sync", post(handlers::sync))
        .route("/v1/records", get(handlers::list_records))
        .route(
            "/v1/records/{record_id}",
            get(handlers::get_record)
                .patch(handlers::update_record)
                .delete(handlers::delete_record),
        )
        .route("/v1/records/{record_id}/content", get(handlers::get_content))
        .layer(TimeoutLayer::new(request_timeout));

    // Middleware layers are applied in reverse order (outermost first):
    // TraceLayer -> Auth -> Timeout -> Handler
    Router::new()
        .merge(upload_routes)
        .merge(api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
