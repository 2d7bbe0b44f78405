//! Terminal error formatter.
//!
//! The pipeline's failure sink: any error raised by a stage ends up here
//! and leaves as a single JSON envelope. The formatter recognizes typed
//! [`ConveyorError`]s and [`JsonError`] projections, degrades anything
//! else to a generic 500 envelope, and contains its own secondary
//! failures: from its caller's perspective this stage cannot fail, it
//! can only forward an error when the response was already committed.

use conveyor_core::{ConveyorError, Exchange, JsonError};
use http::StatusCode;
use serde_json::{json, Value};

/// Converts any pipeline failure into a client-visible JSON envelope.
#[derive(Debug, Clone)]
pub struct ErrorFormatter {
    show_trace: bool,
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ErrorFormatter {
    /// Creates a formatter. `show_trace` controls whether envelopes carry
    /// trace information; disable it for client-facing deployments.
    #[must_use]
    pub const fn new(show_trace: bool) -> Self {
        Self { show_trace }
    }

    /// Handles a failed exchange.
    ///
    /// Returns `Err` only when the response headers were already sent, in
    /// which case the error belongs to the host framework's own failure
    /// path, where writing again would corrupt the response. In every other
    /// case the exchange ends with an error envelope and this returns
    /// `Ok(())`.
    pub fn handle(&self, exchange: &mut Exchange, err: anyhow::Error) -> anyhow::Result<()> {
        if exchange.response().headers_sent() {
            return Err(err);
        }

        let (status, body) = self.render(&err);
        tracing::error!(status = status.as_u16(), error = %err, "pipeline failed");

        exchange.response_mut().set_status(status);
        if let Err(write_err) = exchange.response_mut().send_json(&body) {
            // Secondary failure: fall back to the fixed minimal envelope.
            tracing::error!(error = %write_err, "error envelope write failed");
            let trace = untyped_to_json(&anyhow::Error::new(write_err), self.show_trace);
            exchange
                .response_mut()
                .set_status(StatusCode::INTERNAL_SERVER_ERROR);
            exchange
                .response_mut()
                .force_json(&json!({ "error": "Server error", "trace": trace }));
        }

        Ok(())
    }

    fn render(&self, err: &anyhow::Error) -> (StatusCode, Value) {
        if let Some(typed) = err.downcast_ref::<ConveyorError>() {
            (typed.status(), typed.to_json(self.show_trace))
        } else if let Some(projected) = err.downcast_ref::<JsonError>() {
            (projected.status(), projected.to_json(self.show_trace))
        } else {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                untyped_to_json(err, self.show_trace),
            )
        }
    }
}

/// Generic trace-to-JSON conversion for errors outside the taxonomy.
fn untyped_to_json(err: &anyhow::Error, show_trace: bool) -> Value {
    let mut body = json!({
        "name": "Error",
        "message": err.to_string(),
    });
    if show_trace {
        body["stack"] = Value::String(format!("{err:?}"));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_json(exchange: &Exchange) -> Value {
        serde_json::from_slice(exchange.response().body().unwrap()).unwrap()
    }

    #[test]
    fn test_typed_error_envelope() {
        let formatter = ErrorFormatter::new(false);
        let mut exchange = Exchange::new();

        formatter
            .handle(&mut exchange, ConveyorError::not_found("x").into())
            .unwrap();

        assert_eq!(exchange.response().status(), StatusCode::NOT_FOUND);
        let body = body_json(&exchange);
        assert_eq!(body["status"], 404);
        assert_eq!(body["title"], "Not Found");
        assert_eq!(body["message"], "x");
        assert!(body["meta"].is_null());
        assert!(body.get("trace").is_none());
    }

    #[test]
    fn test_typed_error_with_trace() {
        let formatter = ErrorFormatter::new(true);
        let mut exchange = Exchange::new();

        formatter
            .handle(&mut exchange, ConveyorError::forbidden("nope").into())
            .unwrap();

        let body = body_json(&exchange);
        assert!(body["meta"]["trace"].is_string());
    }

    #[test]
    fn test_untyped_error_gets_500_with_stack() {
        let formatter = ErrorFormatter::new(true);
        let mut exchange = Exchange::new();

        formatter
            .handle(&mut exchange, anyhow::anyhow!("boom"))
            .unwrap();

        assert_eq!(
            exchange.response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let body = body_json(&exchange);
        assert_eq!(body["name"], "Error");
        assert_eq!(body["message"], "boom");
        assert!(body["stack"].is_string());
    }

    #[test]
    fn test_untyped_error_trimmed_without_trace() {
        let formatter = ErrorFormatter::new(false);
        let mut exchange = Exchange::new();

        formatter
            .handle(&mut exchange, anyhow::anyhow!("boom"))
            .unwrap();

        let body = body_json(&exchange);
        assert_eq!(body["name"], "Error");
        assert!(body.get("stack").is_none());
    }

    #[test]
    fn test_json_error_uses_own_projection() {
        let formatter = ErrorFormatter::new(true);
        let mut exchange = Exchange::new();

        let projected = JsonError::new(json!({
            "name": "UpstreamError",
            "message": "gateway exploded",
            "stack": "..."
        }))
        .with_status(StatusCode::BAD_GATEWAY);

        formatter.handle(&mut exchange, projected.into()).unwrap();

        assert_eq!(exchange.response().status(), StatusCode::BAD_GATEWAY);
        let body = body_json(&exchange);
        assert_eq!(body["name"], "UpstreamError");
        assert_eq!(body["stack"], "...");
    }

    #[test]
    fn test_json_error_trimmed_without_trace() {
        let formatter = ErrorFormatter::new(false);
        let mut exchange = Exchange::new();

        let projected = JsonError::new(json!({
            "name": "UpstreamError",
            "message": "gateway exploded",
            "stack": "..."
        }));

        formatter.handle(&mut exchange, projected.into()).unwrap();

        let body = body_json(&exchange);
        assert_eq!(
            body,
            json!({"name": "UpstreamError", "message": "gateway exploded"})
        );
    }

    #[test]
    fn test_forwards_when_headers_sent() {
        let formatter = ErrorFormatter::new(true);
        let mut exchange = Exchange::new();
        exchange.response_mut().end();

        let result = formatter.handle(&mut exchange, anyhow::anyhow!("late failure"));
        assert_eq!(result.unwrap_err().to_string(), "late failure");
        assert!(exchange.response().body().is_none());
    }
}
