//! IO pipeline orchestrator.
//!
//! An [`Io`] instance holds the compiled request/response schemas and the
//! extra acceptable content types for one route. From it the caller
//! produces two stages: [`Io::process_request`], which gates the inbound
//! exchange, and [`Io::send_response`], which finishes the outbound side.
//! Between the two, handlers communicate through the exchange's reserved
//! io slots via the associated setter and getter functions.

use crate::negotiate;
use crate::schema::{self, SchemaBuildError};
use conveyor_core::{ConfigurationError, ConveyorError, Exchange, Status};
use conveyor_middleware::{BoxFuture, Flow, Stage};
use jsonschema::Validator;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Options for [`Io::send_response`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SendResponseOptions {
    /// Halt the pipeline after a successful write instead of continuing.
    pub skip_next_on_success: bool,
}

/// Compiled per-route validation configuration.
struct IoConfig {
    req_body_schema: Option<Validator>,
    req_query_schema: Option<Validator>,
    res_body_schema: Option<Validator>,
    content_types: Vec<String>,
}

/// Request/response validation and serialization for one route.
///
/// Cheap to clone; stage handles share the compiled configuration.
///
/// # Example
///
/// ```ignore
/// let io = Io::builder()
///     .req_body_schema(json!({"type": "object", "required": ["name"]}))
///     .build()?;
///
/// let pipeline = Pipeline::builder()
///     .stage(io.process_request())
///     .stage(handler)
///     .stage(io.send_response(SendResponseOptions::default()))
///     .build();
/// ```
#[derive(Clone)]
pub struct Io {
    inner: Arc<IoConfig>,
}

impl Io {
    /// Creates a builder with no schemas and no extra content types.
    #[must_use]
    pub fn builder() -> IoBuilder {
        IoBuilder::default()
    }

    /// Produces the inbound validation stage.
    #[must_use]
    pub fn process_request(&self) -> ProcessRequest {
        ProcessRequest {
            config: self.inner.clone(),
        }
    }

    /// Produces the outbound serialization stage.
    #[must_use]
    pub fn send_response(&self, options: SendResponseOptions) -> SendResponse {
        SendResponse {
            config: self.inner.clone(),
            options,
        }
    }

    /// Stores `data` in the exchange's io slot with status [`Status::Ok`].
    pub fn set(exchange: &mut Exchange, data: Value) {
        Self::set_with_status(exchange, data, Status::Ok);
    }

    /// Stores `data` in the exchange's io slot with an explicit status.
    pub fn set_with_status(exchange: &mut Exchange, data: Value, status: Status) {
        let locals = exchange.locals_mut();
        locals.set_io_data(Some(data));
        locals.set_io_status(Some(status));
    }

    /// Stores `data` at a dotted `path` inside the io data, creating
    /// intermediate objects as needed, and sets status [`Status::Ok`].
    /// Non-object intermediates along the path are overwritten.
    pub fn set_at(exchange: &mut Exchange, path: &str, data: Value) {
        let locals = exchange.locals_mut();
        let slot = locals.io_data_mut();
        if !slot.as_ref().is_some_and(Value::is_object) {
            *slot = Some(Value::Object(Map::new()));
        }
        let Some(root) = slot else { unreachable!() };
        set_value_path(root, path, data);
        locals.set_io_status(Some(Status::Ok));
    }

    /// Returns the stored io data, if any.
    #[must_use]
    pub fn get(exchange: &Exchange) -> Option<&Value> {
        exchange.locals().io_data()
    }

    /// Returns the value at a dotted `path` inside the io data.
    #[must_use]
    pub fn get_at<'a>(exchange: &'a Exchange, path: &str) -> Option<&'a Value> {
        let mut current = exchange.locals().io_data()?;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Returns the stored io status, if any was set.
    #[must_use]
    pub fn status(exchange: &Exchange) -> Option<Status> {
        exchange.locals().io_status()
    }

    /// Stores `data` with status [`Status::Created`].
    pub fn set_created(exchange: &mut Exchange, data: Value) {
        Self::set_with_status(exchange, data, Status::Created);
    }

    /// Clears the io data and sets status [`Status::NoContent`].
    pub fn set_empty(exchange: &mut Exchange) {
        Self::set_with_status(exchange, Value::Null, Status::NoContent);
    }

    /// Clears the io data and sets status [`Status::BadRequest`].
    pub fn set_bad_request(exchange: &mut Exchange) {
        Self::set_with_status(exchange, Value::Null, Status::BadRequest);
    }

    /// Clears the io data and sets status [`Status::Unauthorized`].
    pub fn set_unauthorized(exchange: &mut Exchange) {
        Self::set_with_status(exchange, Value::Null, Status::Unauthorized);
    }

    /// Clears the io data and sets status [`Status::Forbidden`].
    pub fn set_forbidden(exchange: &mut Exchange) {
        Self::set_with_status(exchange, Value::Null, Status::Forbidden);
    }

    /// Clears the io data and sets status [`Status::NotFound`].
    pub fn set_not_found(exchange: &mut Exchange) {
        Self::set_with_status(exchange, Value::Null, Status::NotFound);
    }

    /// Forces the response `Content-Type` header to `application/json`.
    ///
    /// Serializing through the response stage already sets this; the
    /// helper is for handlers that write the response themselves.
    pub fn set_response_headers(exchange: &mut Exchange) {
        exchange.response_mut().insert_header(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static(crate::negotiate::JSON_CONTENT_TYPE),
        );
    }

    /// Resolves the stored status (default [`Status::NoContent`]) and sets
    /// the outbound HTTP status code. Returns whether the response body
    /// should be serialized.
    pub fn prepare_response(exchange: &mut Exchange) -> Result<bool, ConfigurationError> {
        let status = Self::status(exchange).unwrap_or(Status::NoContent);
        let options = status.resolve()?;
        exchange.response_mut().set_status(options.code);
        Ok(options.should_serialize)
    }
}

/// Lodash-style dotted path write: walks `path` creating object
/// intermediates, replacing whatever sits at the final key.
fn set_value_path(root: &mut Value, path: &str, data: Value) {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Some(map) = current.as_object_mut() else {
            unreachable!()
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), data);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// True for the values the pipeline refuses to serialize as a success
/// body: absent data, empty strings, and empty collections.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Inbound stage: negotiates content types, validates body and query
/// against the configured schemas, and stores the body in the io slot.
pub struct ProcessRequest {
    config: Arc<IoConfig>,
}

impl ProcessRequest {
    fn validate(&self, exchange: &Exchange) -> Result<(), ConveyorError> {
        negotiate::validate_headers(exchange.headers(), &self.config.content_types)?;

        if let Some(validator) = &self.config.req_body_schema {
            if let Some(mut details) = schema::validate(exchange.body(), validator) {
                details.where_ = format!("body{}", details.where_);
                return Err(ConveyorError::input_with_details(
                    details.why.clone(),
                    details,
                ));
            }
        }

        if let Some(validator) = &self.config.req_query_schema {
            if let Some(mut details) = schema::validate(exchange.query(), validator) {
                details.where_ = format!("query{}", details.where_);
                return Err(ConveyorError::input_with_details(
                    details.why.clone(),
                    details,
                ));
            }
        }

        Ok(())
    }
}

impl Stage for ProcessRequest {
    fn name(&self) -> &'static str {
        "io_process_request"
    }

    fn call<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, anyhow::Result<Flow>> {
        Box::pin(async move {
            self.validate(exchange)?;
            tracing::debug!("request validated, storing body");
            // Status stays unset so an untouched exchange resolves to
            // NO_CONTENT on the way out.
            let body = exchange.body().clone();
            exchange.locals_mut().set_io_data(Some(body));
            Ok(Flow::Continue)
        })
    }
}

/// Outbound stage: resolves the stored status, gates serialization, and
/// writes the JSON body.
pub struct SendResponse {
    config: Arc<IoConfig>,
    options: SendResponseOptions,
}

impl Stage for SendResponse {
    fn name(&self) -> &'static str {
        "io_send_response"
    }

    fn call<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, anyhow::Result<Flow>> {
        Box::pin(async move {
            let should_serialize = Io::prepare_response(exchange)?;
            if !should_serialize {
                tracing::debug!(
                    status = exchange.response().status().as_u16(),
                    "ending response without body"
                );
                exchange.response_mut().end();
                return Ok(Flow::Halt);
            }

            let data = Io::get(exchange).cloned().unwrap_or(Value::Null);
            if is_empty_value(&data) {
                return Err(ConveyorError::output("No data to serialize").into());
            }

            // Validation failures must surface before any byte is written.
            if let Some(validator) = &self.config.res_body_schema {
                if let Some(details) = schema::validate(&data, validator) {
                    return Err(ConveyorError::output_with_details(
                        details.why.clone(),
                        details,
                    )
                    .into());
                }
            }

            exchange.response_mut().send_json(&data)?;
            if self.options.skip_next_on_success {
                Ok(Flow::Halt)
            } else {
                Ok(Flow::Continue)
            }
        })
    }
}

/// Builder for [`Io`]; schemas are compiled once at [`IoBuilder::build`].
#[derive(Default)]
pub struct IoBuilder {
    req_body_schema: Option<Value>,
    req_query_schema: Option<Value>,
    res_body_schema: Option<Value>,
    content_types: Vec<String>,
}

impl IoBuilder {
    /// Sets the schema the request body must conform to.
    #[must_use]
    pub fn req_body_schema(mut self, schema: Value) -> Self {
        self.req_body_schema = Some(schema);
        self
    }

    /// Sets the schema the request query parameters must conform to.
    #[must_use]
    pub fn req_query_schema(mut self, schema: Value) -> Self {
        self.req_query_schema = Some(schema);
        self
    }

    /// Sets the schema the response body must conform to.
    #[must_use]
    pub fn res_body_schema(mut self, schema: Value) -> Self {
        self.res_body_schema = Some(schema);
        self
    }

    /// Adds extra content types accepted alongside the JSON set.
    #[must_use]
    pub fn content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Compiles the configured schemas.
    pub fn build(self) -> Result<Io, SchemaBuildError> {
        let compile_opt = |schema: Option<Value>| schema.as_ref().map(schema::compile).transpose();
        Ok(Io {
            inner: Arc::new(IoConfig {
                req_body_schema: compile_opt(self.req_body_schema)?,
                req_query_schema: compile_opt(self.req_query_schema)?,
                res_body_schema: compile_opt(self.res_body_schema)?,
                content_types: self.content_types,
            }),
        })
    }
}
