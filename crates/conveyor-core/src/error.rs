//! Typed error taxonomy and JSON projections.
//!
//! All failures the pipeline raises or recognizes fall into the closed set
//! of [`ErrorKind`]s, each immutably bound to an HTTP status and a machine
//! title. [`ConveyorError`] carries the kind together with a human-readable
//! message, optional validation [`ErrorDetails`], and a backtrace captured
//! at construction. A single [`ConveyorError::to_json`] projection
//! dispatches on the kind, so the terminal handler treats every typed error
//! uniformly.
//!
//! Downstream code that needs an envelope shape the taxonomy does not cover
//! can raise a [`JsonError`] instead, which carries its own projection.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::backtrace::Backtrace;
use thiserror::Error;

/// The `{why, where, how}` triple describing a schema validation failure.
///
/// `why` states the intent of the check, `where` the schema-relative
/// location of the first-order failure (prefixed by the caller with `body`
/// or `query`), and `how` the specific rule violated: an enumerated list
/// when several alternative sub-schemas each failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Intent of the failed check.
    pub why: String,
    /// Location of the failure, e.g. a schema path.
    #[serde(rename = "where")]
    pub where_: String,
    /// The specific rule that was violated.
    pub how: String,
}

/// Closed set of typed failure kinds.
///
/// Each kind is bound to a fixed HTTP status and envelope title. Input and
/// output kinds are raised by the pipeline itself; the rest are domain
/// errors raised by downstream handlers and recognized by the terminal
/// handler through the same contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request was malformed or unacceptable (400).
    Input,
    /// The handler produced an invalid or absent response (500).
    Output,
    /// The requested resource does not exist (404).
    NotFound,
    /// The caller may not perform this operation (403).
    Forbidden,
    /// The request itself is invalid (400).
    BadRequest,
    /// The request conflicts with existing state (409).
    Conflict,
}

impl ErrorKind {
    /// Returns the HTTP status bound to this kind.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Input | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Output => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict => StatusCode::CONFLICT,
        }
    }

    /// Returns the machine title placed in the envelope's `title` field.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Input => "InputError",
            Self::Output => "OutputError",
            Self::NotFound => "Not Found",
            Self::Forbidden => "Forbidden",
            Self::BadRequest => "Bad request",
            Self::Conflict => "Conflict",
        }
    }
}

/// A typed pipeline failure.
///
/// # Example
///
/// ```
/// use conveyor_core::ConveyorError;
///
/// let err = ConveyorError::not_found("user 42 does not exist");
/// assert_eq!(err.status().as_u16(), 404);
/// assert_eq!(err.title(), "Not Found");
///
/// let body = err.to_json(false);
/// assert!(body["meta"].is_null());
/// ```
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConveyorError {
    kind: ErrorKind,
    message: String,
    details: Option<ErrorDetails>,
    trace: String,
}

impl ConveyorError {
    fn new(kind: ErrorKind, message: impl Into<String>, details: Option<ErrorDetails>) -> Self {
        Self {
            kind,
            message: message.into(),
            details,
            trace: Backtrace::force_capture().to_string(),
        }
    }

    /// Creates an input validation error (400).
    #[must_use]
    pub fn input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Input, message, None)
    }

    /// Creates an input validation error carrying schema failure details.
    #[must_use]
    pub fn input_with_details(message: impl Into<String>, details: ErrorDetails) -> Self {
        Self::new(ErrorKind::Input, message, Some(details))
    }

    /// Creates an output validation error (500).
    #[must_use]
    pub fn output(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Output, message, None)
    }

    /// Creates an output validation error carrying schema failure details.
    #[must_use]
    pub fn output_with_details(message: impl Into<String>, details: ErrorDetails) -> Self {
        Self::new(ErrorKind::Output, message, Some(details))
    }

    /// Creates a not-found error (404).
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message, None)
    }

    /// Creates a forbidden error (403).
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message, None)
    }

    /// Creates a bad-request error (400).
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message, None)
    }

    /// Creates a conflict error (409).
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message, None)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the HTTP status bound to this error's kind.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// Returns the envelope title bound to this error's kind.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        self.kind.title()
    }

    /// Returns the validation details, if any.
    #[must_use]
    pub fn details(&self) -> Option<&ErrorDetails> {
        self.details.as_ref()
    }

    /// Projects this error into the uniform JSON envelope.
    ///
    /// The envelope is `{status, title, message, details?, meta}` where
    /// `meta` is `{trace}` when `show_trace` is set and `null` otherwise.
    #[must_use]
    pub fn to_json(&self, show_trace: bool) -> Value {
        let meta = if show_trace {
            json!({ "trace": self.trace })
        } else {
            Value::Null
        };

        let mut body = json!({
            "status": self.status().as_u16(),
            "title": self.title(),
            "message": self.message,
            "meta": meta,
        });

        if let Some(details) = &self.details {
            body["details"] = serde_json::to_value(details).unwrap_or(Value::Null);
        }

        body
    }
}

/// A failure that carries its own JSON projection.
///
/// Escape hatch for downstream errors whose envelope the taxonomy does not
/// cover. The terminal handler uses the body as-is when traces are enabled
/// and trims it to the `{name, message}` subset otherwise.
#[derive(Debug, Clone)]
pub struct JsonError {
    status: StatusCode,
    body: Value,
}

impl JsonError {
    /// Wraps a JSON body at the default 500 status.
    #[must_use]
    pub fn new(body: Value) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body,
        }
    }

    /// Overrides the HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Returns the HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the full projection body.
    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Projects this error, trimmed to `{name, message}` when traces are
    /// disabled.
    #[must_use]
    pub fn to_json(&self, show_trace: bool) -> Value {
        if show_trace {
            return self.body.clone();
        }

        let mut trimmed = serde_json::Map::new();
        if let Some(fields) = self.body.as_object() {
            for key in ["name", "message"] {
                if let Some(value) = fields.get(key) {
                    trimmed.insert(key.to_string(), value.clone());
                }
            }
        }
        Value::Object(trimmed)
    }
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.body.get("message").and_then(Value::as_str) {
            Some(message) => write!(f, "{message}"),
            None => write!(f, "error with custom JSON projection"),
        }
    }
}

impl std::error::Error for JsonError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_status_table() {
        assert_eq!(ErrorKind::Input.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Output.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorKind::BadRequest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Conflict.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_found_envelope_without_trace() {
        let err = ConveyorError::not_found("x");
        let body = err.to_json(false);

        assert_eq!(body["status"], 404);
        assert_eq!(body["title"], "Not Found");
        assert_eq!(body["message"], "x");
        assert!(body["meta"].is_null());
        assert!(body.get("details").is_none());
        assert!(body.get("trace").is_none());
    }

    #[test]
    fn test_envelope_with_trace() {
        let err = ConveyorError::forbidden("nope");
        let body = err.to_json(true);

        assert_eq!(body["status"], 403);
        assert_eq!(body["title"], "Forbidden");
        assert!(body["meta"]["trace"].is_string());
    }

    #[test]
    fn test_input_error_carries_details() {
        let details = ErrorDetails {
            why: "Resource does not respect the schema".to_string(),
            where_: "body/a".to_string(),
            how: "missing property b".to_string(),
        };
        let err = ConveyorError::input_with_details(details.why.clone(), details);

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = err.to_json(false);
        assert_eq!(body["title"], "InputError");
        assert_eq!(body["details"]["where"], "body/a");
        assert_eq!(body["details"]["how"], "missing property b");
    }

    #[test]
    fn test_details_serde_field_names() {
        let details = ErrorDetails {
            why: "w".to_string(),
            where_: "p".to_string(),
            how: "h".to_string(),
        };
        let json = serde_json::to_string(&details).unwrap();
        assert!(json.contains("\"where\":\"p\""));
        assert!(!json.contains("where_"));
    }

    #[test]
    fn test_display_is_message() {
        let err = ConveyorError::conflict("already exists");
        assert_eq!(err.to_string(), "already exists");
    }

    #[test]
    fn test_json_error_defaults_to_500() {
        let err = JsonError::new(json!({"name": "DbError", "message": "boom", "stack": "..."}));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_json_error_trims_without_trace() {
        let err = JsonError::new(json!({"name": "DbError", "message": "boom", "stack": "..."}))
            .with_status(StatusCode::SERVICE_UNAVAILABLE);

        let full = err.to_json(true);
        assert!(full.get("stack").is_some());

        let trimmed = err.to_json(false);
        assert_eq!(trimmed, json!({"name": "DbError", "message": "boom"}));
    }
}
