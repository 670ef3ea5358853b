//! Content classification for the stitched read path.
//!
//! The backing store carries no definitive content type, so the reader infers
//! one from the filename extension via a fixed table. Inline rendering is
//! restricted to a safelist; HTML, SVG, and script-like types are always
//! forced to download regardless of extension-derived type.

/// Classification of a record's content for response headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    /// Content type to serve.
    pub content_type: &'static str,
    /// Whether the browser may render the content inline. When false the
    /// response carries `Content-Disposition: attachment`.
    pub inline: bool,
}

/// Classify content by filename extension.
///
/// Unknown extensions map to generic binary, served as a download.
pub fn classify(display_name: &str) -> Classification {
    let ext = display_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    // Fixed table: images, video, pdf, and plain text may render inline.
    // Active content (html, svg, scripts) is never inline, since a stitched
    // read serves caller-supplied bytes on our origin.
    let (content_type, inline) = match ext.as_str() {
        "png" => ("image/png", true),
        "jpg" | "jpeg" => ("image/jpeg", true),
        "gif" => ("image/gif", true),
        "webp" => ("image/webp", true),
        "bmp" => ("image/bmp", true),
        "mp4" => ("video/mp4", true),
        "webm" => ("video/webm", true),
        "mov" => ("video/quicktime", true),
        "pdf" => ("application/pdf", true),
        "txt" | "log" | "md" => ("text/plain", true),
        "csv" => ("text/csv", true),
        "html" | "htm" => ("text/html", false),
        "svg" => ("image/svg+xml", false),
        "js" | "mjs" => ("text/javascript", false),
        "xml" => ("application/xml", false),
        _ => ("application/octet-stream", false),
    };

    Classification {
        content_type,
        inline,
    }
}

/// Build the `Content-Disposition` header value for a classified response.
///
/// Quotes are stripped from the filename to keep the header well-formed.
pub fn disposition(classification: Classification, display_name: &str) -> String {
    let kind = if classification.inline {
        "inline"
    } else {
        "attachment"
    };
    let safe_name: String = display_name
        .chars()
        .filter(|c| *c != '"' && !c.is_control())
        .collect();
    format!("{kind}; filename=\"{safe_name}\"")
}
