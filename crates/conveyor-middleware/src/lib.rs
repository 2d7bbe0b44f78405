//! # Conveyor Middleware
//!
//! Stage pipeline for the Conveyor framework.
//!
//! This crate provides the sequential stage pipeline that requests flow
//! through. Stages are async units of work over a shared [`Exchange`];
//! each stage either lets the exchange continue, halts the run, or fails
//! with an error that the terminal formatter turns into a JSON envelope.
//!
//! ## Control flow
//!
//! ```text
//! Exchange → stage 1 → stage 2 → … → stage N
//!               │
//!               ├─ Ok(Continue)  → next stage
//!               ├─ Ok(Halt)      → run ends, response as committed
//!               └─ Err(_)        → ErrorFormatter → JSON error envelope
//! ```
//!
//! Errors raised after the response was committed cannot be formatted;
//! the pipeline forwards them to the caller instead.
//!
//! ## Example
//!
//! ```
//! use conveyor_middleware::Pipeline;
//!
//! // Stage order is frozen at build time.
//! let pipeline = Pipeline::builder().build();
//! assert_eq!(pipeline.stage_count(), 0);
//! ```

#![doc(html_root_url = "https://docs.rs/conveyor-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error_format;
pub mod pipeline;
pub mod stage;

pub use conveyor_core::Exchange;
pub use error_format::ErrorFormatter;
pub use pipeline::{BoxedStage, Pipeline, PipelineBuilder};
pub use stage::{BoxFuture, Flow, FnStage, Stage};
