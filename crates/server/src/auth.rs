//! Authentication middleware and identity resolution.
//!
//! Requests carry a bearer token; the middleware hashes it and resolves the
//! principal from the catalog. Resolution failure on its own is not an
//! error: anonymous requests proceed and handlers decide per entity whether
//! an identity is required (missing identity is 401, an identity without
//! access is 403).

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use satchel_core::record::{Owner, Record, Visibility};
use sha2::{Digest, Sha256};
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs. Longer values are truncated to prevent
/// log bloat and log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value, truncated by
    /// character count and filtered to printable ASCII.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolved caller identity.
#[derive(Clone, Copy, Debug)]
pub struct Identity {
    pub user_id: Uuid,
    /// Team the user belongs to, if any.
    pub team_id: Option<Uuid>,
}

impl Identity {
    /// Whether this identity owns the entity or belongs to the owning team.
    pub fn owns(&self, owner: &Owner) -> bool {
        match owner {
            Owner::User(id) => *id == self.user_id,
            Owner::Team(id) => self.team_id == Some(*id),
        }
    }

    /// Whether this identity may modify the entity. Only owners (or owning
    /// team members) may append, change visibility, or delete.
    pub fn can_modify(&self, record: &Record) -> bool {
        self.owns(&record.owner)
    }
}

/// Content read access: anything not private is readable by any identified
/// caller; private entities require ownership.
pub fn can_read(identity: &Identity, record: &Record) -> bool {
    record.visibility != Visibility::Private || identity.owns(&record.owner)
}

/// Extract bearer token from the Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Hash a token for catalog lookup. Raw tokens are never stored or logged.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Middleware that resolves the caller identity and sets up trace context.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    if let Some(token_str) = extract_bearer_token(&req) {
        let token_hash = hash_token(token_str);
        if let Some(principal) = state.catalog.get_principal(&token_hash).await? {
            req.extensions_mut().insert(Identity {
                user_id: principal.user_id,
                team_id: principal.team_id,
            });
        }
    }

    let response = next
        .run(req)
        .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
        .await;

    Ok(response)
}

/// Require a resolved identity (401 when absent).
pub fn require_identity(req: &Request) -> ApiResult<Identity> {
    get_identity(req)
        .ok_or_else(|| ApiError::AuthenticationRequired("no usable identity".to_string()))
}

/// Get the identity, if the request carried one.
pub fn get_identity(req: &Request) -> Option<Identity> {
    req.extensions().get::<Identity>().copied()
}
