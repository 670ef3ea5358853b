//! HTTP server for the satchel sync and transfer layer.
//!
//! This crate provides the HTTP surface:
//! - Chunked uploads (record creation and part appends)
//! - Stitched content reads with conditional caching and shaping
//! - Delta sync against the version counter
//! - Record listing, metadata, and deletion

pub mod auth;
pub mod bootstrap;
pub mod conditional;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod shaper;
pub mod state;

pub use auth::{Identity, TraceId};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
