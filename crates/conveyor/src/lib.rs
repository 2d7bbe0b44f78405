//! # Conveyor
//!
//! **Request/response validation and serialization pipeline for JSON HTTP
//! services**
//!
//! Conveyor sits between a host HTTP framework and application handlers:
//!
//! - **Content negotiation** – inbound requests must speak JSON
//! - **Schema validation** – request body, query, and response body are
//!   checked against per-route JSON Schemas
//! - **Explicit statuses** – responses carry a status from a closed table
//!   that decides both the HTTP code and whether a body is serialized
//! - **Uniform errors** – every failure, typed or not, leaves as the same
//!   JSON error envelope
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conveyor::prelude::*;
//! use serde_json::json;
//!
//! let io = Io::builder()
//!     .req_body_schema(json!({"type": "object", "required": ["name"]}))
//!     .build()?;
//!
//! let pipeline = Pipeline::builder()
//!     .stage(io.process_request())
//!     .stage(FnStage::new("create_user", |exchange: &mut Exchange| {
//!         Box::pin(async move {
//!             let user = exchange.body().clone();
//!             Io::set_created(exchange, user);
//!             Ok(())
//!         })
//!     }))
//!     .stage(io.send_response(SendResponseOptions::default()))
//!     .build();
//!
//! pipeline.run(&mut exchange).await?;
//! let response = exchange.into_response();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Exchange → process_request → handler stages → send_response
//!                │                  │                │
//!                └──────── any Err ─┴────────────────┘
//!                                   ↓
//!                            ErrorFormatter → JSON error envelope
//! ```

#![doc(html_root_url = "https://docs.rs/conveyor/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use conveyor_core as core;

// Re-export pipeline types
pub use conveyor_middleware as middleware;

// Re-export IO stage types
pub use conveyor_io as io;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use conveyor::prelude::*;
/// ```
pub mod prelude {
    pub use conveyor_core::{
        ConveyorError, ErrorDetails, ErrorKind, Exchange, JsonError, Locals, Status,
    };

    // Re-export pipeline building blocks
    pub use conveyor_middleware::{
        BoxFuture, ErrorFormatter, Flow, FnStage, Pipeline, PipelineBuilder, Stage,
    };

    // Re-export IO stages and helpers
    pub use conveyor_io::{Io, IoBuilder, SendResponseOptions};
}
