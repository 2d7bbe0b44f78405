//! # Conveyor Core
//!
//! Core types for the Conveyor validation/serialization pipeline: the
//! per-call [`Exchange`] context, the namespaced [`Locals`] scratch store,
//! the [`Status`] table, and the typed error taxonomy.
//!
//! Everything mutable is owned by an `Exchange`, so concurrent requests
//! never share state. Higher layers (`conveyor-middleware`,
//! `conveyor-io`) build the pipeline mechanics on top of these types.

#![doc(html_root_url = "https://docs.rs/conveyor-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod exchange;
pub mod locals;
pub mod status;

// Re-export main types at crate root
pub use error::{ConveyorError, ErrorDetails, ErrorKind, JsonError};
pub use exchange::{Exchange, ExchangeError, ResponseError, ResponseState};
pub use locals::Locals;
pub use status::{ConfigurationError, Status, StatusOptions};
