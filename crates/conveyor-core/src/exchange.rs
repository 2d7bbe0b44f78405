//! The per-call exchange context.
//!
//! An [`Exchange`] carries one request through the pipeline: the inbound
//! headers, the parsed JSON body and query, the [`Locals`] scratch store,
//! and the outbound [`ResponseState`]. The host framework builds one per
//! call (usually via [`Exchange::from_parts`]) and turns the finished
//! state back into an `http::Response` with [`Exchange::into_response`].
//!
//! All mutable pipeline state lives here, so concurrent exchanges never
//! share anything: the `&mut Exchange` a stage receives is the whole
//! world it may touch.

use crate::locals::Locals;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde_json::{Map, Value};
use thiserror::Error;

/// A request could not be turned into an [`Exchange`].
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The request body is not valid JSON.
    #[error("request body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
    /// The query string could not be parsed.
    #[error("request query string is malformed: {0}")]
    InvalidQuery(String),
}

/// A response body write was rejected.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// The status and headers were already committed.
    #[error("response was already sent")]
    AlreadySent,
    /// The payload could not be serialized to JSON.
    #[error("failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The per-call request/response context the pipeline stages operate on.
#[derive(Debug, Default)]
pub struct Exchange {
    headers: HeaderMap,
    body: Value,
    query: Value,
    locals: Locals,
    response: ResponseState,
}

impl Exchange {
    /// Creates an empty exchange, mainly for tests and adapters that fill
    /// it in manually.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an exchange from decomposed `http` request parts.
    ///
    /// An empty body becomes `null`; anything else must parse as JSON.
    /// The query string is decoded into a flat JSON object (later pairs
    /// win on duplicate keys).
    pub fn from_parts(parts: http::request::Parts, body: Bytes) -> Result<Self, ExchangeError> {
        let body = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body)?
        };

        let query = match parts.uri.query() {
            None => Value::Object(Map::new()),
            Some(raw) => {
                let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw)
                    .map_err(|err| ExchangeError::InvalidQuery(err.to_string()))?;
                let mut map = Map::new();
                for (key, value) in pairs {
                    map.insert(key, Value::String(value));
                }
                Value::Object(map)
            }
        };

        Ok(Self {
            headers: parts.headers,
            body,
            query,
            locals: Locals::new(),
            response: ResponseState::default(),
        })
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a request header as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Inserts a request header.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Returns the parsed request body.
    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Replaces the parsed request body.
    pub fn set_body(&mut self, body: Value) {
        self.body = body;
    }

    /// Returns the parsed query parameters.
    #[must_use]
    pub fn query(&self) -> &Value {
        &self.query
    }

    /// Replaces the parsed query parameters.
    pub fn set_query(&mut self, query: Value) {
        self.query = query;
    }

    /// Returns the scratch store.
    #[must_use]
    pub fn locals(&self) -> &Locals {
        &self.locals
    }

    /// Returns the scratch store mutably.
    pub fn locals_mut(&mut self) -> &mut Locals {
        &mut self.locals
    }

    /// Returns the outbound response state.
    #[must_use]
    pub fn response(&self) -> &ResponseState {
        &self.response
    }

    /// Returns the outbound response state mutably.
    pub fn response_mut(&mut self) -> &mut ResponseState {
        &mut self.response
    }

    /// Consumes the exchange and produces the `http` response for the
    /// host framework.
    #[must_use]
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let ResponseState {
            status,
            headers,
            body,
            ..
        } = self.response;

        let mut response = http::Response::new(Full::new(body.unwrap_or_default()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// The outbound side of an exchange.
///
/// Writing a body (or ending the response) commits the status and headers;
/// after that point no further writes are accepted. The terminal error
/// formatter checks [`ResponseState::headers_sent`] before taking over a
/// failed exchange.
#[derive(Debug)]
pub struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
    headers_sent: bool,
    ended: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            headers_sent: false,
            ended: false,
        }
    }
}

impl ResponseState {
    /// Returns the response status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the response status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Inserts a response header.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Returns whether the status/headers commit point has passed.
    #[must_use]
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    /// Returns whether the response has been finished.
    #[must_use]
    pub fn ended(&self) -> bool {
        self.ended
    }

    /// Returns the written body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Ends the response with no body, committing status and headers.
    pub fn end(&mut self) {
        self.headers_sent = true;
        self.ended = true;
    }

    /// Serializes `value` as the JSON response body and commits.
    ///
    /// Sets `Content-Type: application/json`. Fails without touching the
    /// response when the commit point has already passed or the payload
    /// cannot be serialized; an invalid payload is never partially
    /// emitted.
    pub fn send_json(&mut self, value: &Value) -> Result<(), ResponseError> {
        if self.headers_sent {
            return Err(ResponseError::AlreadySent);
        }
        let bytes = serde_json::to_vec(value)?;

        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        self.headers_sent = true;
        self.ended = true;
        Ok(())
    }

    /// Last-resort write used by the terminal error formatter.
    ///
    /// Overwrites whatever is pending and cannot fail: if even the
    /// fallback envelope refuses to serialize, a fixed byte string is
    /// written instead.
    pub fn force_json(&mut self, value: &Value) {
        let bytes = serde_json::to_vec(value)
            .unwrap_or_else(|_| br#"{"error":"Server error"}"#.to_vec());

        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        self.headers_sent = true;
        self.ended = true;
    }
}
