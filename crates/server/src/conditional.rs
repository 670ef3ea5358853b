//! Conditional request evaluation.
//!
//! The cache validator is derived from catalog state (record version and
//! update time), never from content bytes. A match means the whole request
//! short-circuits to 304 before any blob is opened.

use axum::http::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH};
use axum::http::HeaderMap;
use satchel_core::record::Record;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// IMF-fixdate, the HTTP date format (RFC 9110 section 5.6.7).
const IMF_FIXDATE: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Build the entity tag for a record.
pub fn etag_for(record: &Record) -> String {
    format!(
        "\"{}-{}\"",
        record.version,
        record.updated_at.unix_timestamp()
    )
}

/// Format a timestamp as an HTTP date.
pub fn http_date(ts: OffsetDateTime) -> String {
    ts.to_offset(time::UtcOffset::UTC)
        .format(&IMF_FIXDATE)
        .unwrap_or_default()
}

/// Parse an HTTP date. Only IMF-fixdate is accepted; the obsolete RFC 850
/// and asctime forms are treated as unparseable (condition ignored).
pub fn parse_http_date(value: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(value.trim(), &IMF_FIXDATE)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Evaluate conditional headers against a record's validators.
///
/// `If-None-Match` takes precedence over `If-Modified-Since` when both are
/// present. Time comparison is at whole-second granularity since HTTP dates
/// carry no sub-second precision.
pub fn not_modified(headers: &HeaderMap, record: &Record) -> bool {
    if let Some(value) = headers.get(IF_NONE_MATCH).and_then(|v| v.to_str().ok()) {
        return etag_matches(value, &etag_for(record));
    }

    if let Some(value) = headers.get(IF_MODIFIED_SINCE).and_then(|v| v.to_str().ok()) {
        if let Some(since) = parse_http_date(value) {
            return record.updated_at.unix_timestamp() <= since.unix_timestamp();
        }
    }

    false
}

/// Match an If-None-Match header value against an entity tag. Weak
/// comparison: a `W/` prefix on either side is ignored.
fn etag_matches(header: &str, etag: &str) -> bool {
    let target = etag.trim_start_matches("W/");
    header.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || candidate.trim_start_matches("W/") == target
    })
}
