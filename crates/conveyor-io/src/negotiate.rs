//! Content negotiation.
//!
//! The pipeline only speaks JSON. Inbound requests must declare a JSON
//! `Content-Type` and accept at least one of the supported response types;
//! instances may widen the accepted set with extra configured types.

use conveyor_core::ConveyorError;
use http::HeaderMap;

/// The content type every serialized response carries.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Accept-header values the pipeline recognizes as "JSON is fine".
pub const SUPPORTED_CONTENT_TYPES: [&str; 3] = [JSON_CONTENT_TYPE, "*/*", "*"];

/// Checks the request's `Content-Type` and `Accept` headers.
///
/// The `Accept` header is parsed as a comma-separated list with each
/// entry stripped of its quality-value parameter (`;q=...`); the
/// `extra_types` configured on the instance are appended to that list
/// before intersecting with [`SUPPORTED_CONTENT_TYPES`]. A missing
/// `Accept` header is treated as the empty string, which never
/// intersects.
pub fn validate_headers(headers: &HeaderMap, extra_types: &[String]) -> Result<(), ConveyorError> {
    let content_type = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if headers.is_empty() || !content_type.contains(JSON_CONTENT_TYPE) {
        return Err(ConveyorError::input(
            "Please use application-json as Content-Type header",
        ));
    }

    let accept = headers
        .get(http::header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    let mut declared: Vec<&str> = accept
        .split(',')
        .map(|entry| entry.split(';').next().unwrap_or(""))
        .collect();
    declared.extend(extra_types.iter().map(String::as_str));

    let accepts_json = declared
        .iter()
        .any(|entry| SUPPORTED_CONTENT_TYPES.contains(entry));
    if !accepts_json {
        let listed = serde_json::to_string(&declared).unwrap_or_default();
        return Err(ConveyorError::input(format!(
            "Client does not accept JSON responses. \
             Did you set the correct \"Accept\" header?{listed}"
        )));
    }

    Ok(())
}
