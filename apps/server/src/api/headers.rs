//! Version headers for optimistic concurrency on patient documents
//!
//! Versions travel as weak ETags: `W/"3"`.

use axum::http::{header, HeaderMap, HeaderValue};

/// Parse a weak (or strong) ETag into a version number.
///
/// # Examples
/// ```
/// use raito::api::headers::parse_etag;
/// assert_eq!(parse_etag("W/\"3\""), Some(3));
/// assert_eq!(parse_etag("\"7\""), Some(7));
/// assert_eq!(parse_etag("invalid"), None);
/// ```
pub fn parse_etag(etag: &str) -> Option<i64> {
    etag.trim()
        .trim_start_matches("W/")
        .trim_matches('"')
        .parse()
        .ok()
}

pub fn format_etag(version: i64) -> String {
    format!("W/\"{}\"", version)
}

/// Expected version from `If-Match`, if present and well-formed.
pub fn extract_if_match(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_etag)
}

/// `If-Match` wins over a `version` carried in the body.
pub fn expected_version(headers: &HeaderMap, body_version: Option<i64>) -> Option<i64> {
    extract_if_match(headers).or(body_version)
}

pub fn etag_header(version: i64) -> [(header::HeaderName, HeaderValue); 1] {
    let value = HeaderValue::from_str(&format_etag(version))
        .unwrap_or_else(|_| HeaderValue::from_static("W/\"0\""));
    [(header::ETAG, value)]
}
