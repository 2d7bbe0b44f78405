//! # Conveyor IO
//!
//! Request/response validation and serialization stages for the Conveyor
//! pipeline.
//!
//! An [`Io`] instance is configured per route with optional JSON Schemas
//! for the request body, the request query, and the response body, plus
//! any extra acceptable content types. It yields two stages:
//!
//! - [`Io::process_request`] negotiates content types, validates the
//!   inbound body and query, and stores the payload in the exchange's
//!   reserved io slot.
//! - [`Io::send_response`] resolves the stored status through the
//!   status table, decides whether to serialize, optionally validates the
//!   outgoing payload, and writes it as JSON.
//!
//! Handlers in between use the associated functions ([`Io::set`],
//! [`Io::set_created`], [`Io::set_not_found`], ...) to stage their result
//! and status.

#![doc(html_root_url = "https://docs.rs/conveyor-io/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod io;
pub mod negotiate;
pub mod schema;

pub use io::{Io, IoBuilder, ProcessRequest, SendResponse, SendResponseOptions};
pub use negotiate::{validate_headers, JSON_CONTENT_TYPE, SUPPORTED_CONTENT_TYPES};
pub use schema::SchemaBuildError;
