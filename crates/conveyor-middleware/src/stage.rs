//! Core stage trait and flow control.
//!
//! A [`Stage`] is one step of the cooperative pipeline. It receives the
//! exchange by mutable borrow and reports back on a single channel: a
//! successful stage either continues the pipeline or halts it (after
//! finishing the response itself), and every failure, synchronous or
//! awaited, surfaces as the `Err` arm of the same `Result`. There is no
//! second path for an async stage's rejection to escape unobserved.
//!
//! # Example
//!
//! ```ignore
//! use conveyor_middleware::{BoxFuture, Flow, Stage};
//! use conveyor_core::Exchange;
//!
//! struct AuditStage;
//!
//! impl Stage for AuditStage {
//!     fn name(&self) -> &'static str {
//!         "audit"
//!     }
//!
//!     fn call<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, anyhow::Result<Flow>> {
//!         Box::pin(async move {
//!             tracing::debug!(body = %exchange.body(), "auditing request");
//!             Ok(Flow::Continue)
//!         })
//!     }
//! }
//! ```

use conveyor_core::Exchange;
use std::future::Future;
use std::pin::Pin;

/// A boxed future, the return type of stage invocations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the pipeline should do after a stage completes successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Invoke the next registered stage.
    Continue,
    /// Stop; the stage has finished the response itself.
    Halt,
}

/// One step of the pipeline.
///
/// # Invariants
///
/// - A stage must not write to the exchange's locals after raising a
///   failure in the same invocation.
/// - A stage must not write the response body after the status/headers
///   commit point ([`ResponseState::headers_sent`](conveyor_core::ResponseState::headers_sent)).
pub trait Stage: Send + Sync + 'static {
    /// Returns the unique name of this stage, used for logging.
    fn name(&self) -> &'static str;

    /// Processes the exchange.
    fn call<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, anyhow::Result<Flow>>;
}

/// A stage built from a fallible async closure.
///
/// This is the bridge for plain async handlers: the closure's rejection is
/// caught by the pipeline's single failure channel instead of escaping,
/// and a normal completion continues the pipeline.
///
/// # Example
///
/// ```ignore
/// let handler = FnStage::new("load_user", |exchange| {
///     Box::pin(async move {
///         let user = fetch_user(exchange.query()).await?;
///         Io::set(exchange, user);
///         Ok(())
///     })
/// });
/// ```
pub struct FnStage<F> {
    name: &'static str,
    func: F,
}

impl<F> FnStage<F>
where
    F: for<'a> Fn(&'a mut Exchange) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
{
    /// Creates a named stage from an async closure.
    pub fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Stage for FnStage<F>
where
    F: for<'a> Fn(&'a mut Exchange) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn call<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, anyhow::Result<Flow>> {
        Box::pin(async move { (self.func)(exchange).await.map(|()| Flow::Continue) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_stage_continues_on_success() {
        let stage = FnStage::new("write_marker", |exchange: &mut Exchange| {
            Box::pin(async move {
                exchange.locals_mut().set("marker", Some(json!(true)));
                Ok(())
            })
        });

        let mut exchange = Exchange::new();
        let flow = stage.call(&mut exchange).await.unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(exchange.locals().get("marker"), Some(&json!(true)));
        assert_eq!(stage.name(), "write_marker");
    }

    #[tokio::test]
    async fn test_fn_stage_captures_rejection() {
        let stage = FnStage::new("always_fails", |_exchange: &mut Exchange| {
            Box::pin(async move { Err(anyhow::anyhow!("deferred failure")) })
        });

        let mut exchange = Exchange::new();
        let err = stage.call(&mut exchange).await.unwrap_err();
        assert_eq!(err.to_string(), "deferred failure");
    }
}
