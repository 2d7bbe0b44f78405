//! Sequential stage pipeline.
//!
//! A pipeline runs its stages in registration order over a single mutable
//! [`Exchange`]. Each stage decides whether the exchange continues to the
//! next stage or halts; any stage error short-circuits the run and is
//! delivered to the terminal [`ErrorFormatter`].
//!
//! The pipeline is immutable after construction: stages are registered on
//! the builder and frozen by `build()`.

use crate::error_format::ErrorFormatter;
use crate::stage::{Flow, Stage};
use conveyor_core::Exchange;
use std::sync::Arc;

/// A type-erased stage that can be stored in a vector.
pub type BoxedStage = Arc<dyn Stage>;

/// An ordered sequence of stages with a terminal error formatter.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::builder()
///     .stage(io.process_request())
///     .stage(load_resource)
///     .stage(io.send_response(SendResponseOptions::default()))
///     .build();
///
/// pipeline.run(&mut exchange).await?;
/// ```
pub struct Pipeline {
    stages: Vec<BoxedStage>,
    formatter: ErrorFormatter,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs the exchange through every stage in order.
    ///
    /// Returns `Ok(())` when the run completes, including runs that ended
    /// in a formatted error response. Returns `Err` only when a stage
    /// failed after the response was already committed, in which case the
    /// caller owns the failure.
    pub async fn run(&self, exchange: &mut Exchange) -> anyhow::Result<()> {
        for stage in &self.stages {
            tracing::debug!(stage = stage.name(), "running stage");
            match stage.call(exchange).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => {
                    tracing::debug!(stage = stage.name(), "pipeline halted");
                    break;
                }
                Err(err) => return self.formatter.handle(exchange, err),
            }
        }
        Ok(())
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Builder for constructing a [`Pipeline`].
pub struct PipelineBuilder {
    stages: Vec<BoxedStage>,
    show_trace: bool,
}

impl PipelineBuilder {
    /// Creates an empty builder. Traces are shown in error envelopes by
    /// default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            show_trace: true,
        }
    }

    /// Appends a stage to the end of the pipeline.
    #[must_use]
    pub fn stage<S: Stage>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Appends an already type-erased stage.
    #[must_use]
    pub fn boxed_stage(mut self, stage: BoxedStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Controls whether error envelopes carry trace information.
    #[must_use]
    pub const fn show_trace(mut self, show_trace: bool) -> Self {
        self.show_trace = show_trace;
        self
    }

    /// Freezes the stage order and builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
            formatter: ErrorFormatter::new(self.show_trace),
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::BoxFuture;
    use conveyor_core::ConveyorError;
    use http::StatusCode;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A test stage that records its invocation order.
    struct OrderTrackingStage {
        name: &'static str,
        counter: Arc<AtomicUsize>,
        order: Arc<Mutex<Vec<&'static str>>>,
        flow: Flow,
    }

    impl Stage for OrderTrackingStage {
        fn name(&self) -> &'static str {
            self.name
        }

        fn call<'a>(&'a self, _exchange: &'a mut Exchange) -> BoxFuture<'a, anyhow::Result<Flow>> {
            Box::pin(async move {
                self.counter.fetch_add(1, Ordering::SeqCst);
                self.order.lock().unwrap().push(self.name);
                Ok(self.flow)
            })
        }
    }

    struct FailingStage;

    impl Stage for FailingStage {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn call<'a>(&'a self, _exchange: &'a mut Exchange) -> BoxFuture<'a, anyhow::Result<Flow>> {
            Box::pin(async move { Err(ConveyorError::not_found("missing resource").into()) })
        }
    }

    fn tracking(
        name: &'static str,
        counter: &Arc<AtomicUsize>,
        order: &Arc<Mutex<Vec<&'static str>>>,
        flow: Flow,
    ) -> OrderTrackingStage {
        OrderTrackingStage {
            name,
            counter: counter.clone(),
            order: order.clone(),
            flow,
        }
    }

    #[tokio::test]
    async fn test_pipeline_executes_in_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let pipeline = Pipeline::builder()
            .stage(tracking("first", &counter, &order, Flow::Continue))
            .stage(tracking("second", &counter, &order, Flow::Continue))
            .stage(tracking("third", &counter, &order, Flow::Continue))
            .build();

        let mut exchange = Exchange::new();
        pipeline.run(&mut exchange).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_halt_skips_remaining_stages() {
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let pipeline = Pipeline::builder()
            .stage(tracking("first", &counter, &order, Flow::Halt))
            .stage(tracking("second", &counter, &order, Flow::Continue))
            .build();

        let mut exchange = Exchange::new();
        pipeline.run(&mut exchange).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(*order.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_stage_error_is_formatted() {
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let pipeline = Pipeline::builder()
            .stage(FailingStage)
            .stage(tracking("after", &counter, &order, Flow::Continue))
            .build();

        let mut exchange = Exchange::new();
        pipeline.run(&mut exchange).await.unwrap();

        // The failing stage stops the run; later stages never execute.
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(exchange.response().status(), StatusCode::NOT_FOUND);

        let body: Value =
            serde_json::from_slice(exchange.response().body().unwrap()).unwrap();
        assert_eq!(body["title"], "Not Found");
        assert_eq!(body["message"], "missing resource");
    }

    #[tokio::test]
    async fn test_error_after_commit_is_forwarded() {
        struct CommitThenFail;

        impl Stage for CommitThenFail {
            fn name(&self) -> &'static str {
                "commit_then_fail"
            }

            fn call<'a>(
                &'a self,
                exchange: &'a mut Exchange,
            ) -> BoxFuture<'a, anyhow::Result<Flow>> {
                Box::pin(async move {
                    exchange.response_mut().end();
                    Err(anyhow::anyhow!("too late"))
                })
            }
        }

        let pipeline = Pipeline::builder().stage(CommitThenFail).build();
        let mut exchange = Exchange::new();

        let result = pipeline.run(&mut exchange).await;
        assert_eq!(result.unwrap_err().to_string(), "too late");
    }

    #[tokio::test]
    async fn test_empty_pipeline() {
        let pipeline = Pipeline::builder().build();
        let mut exchange = Exchange::new();
        pipeline.run(&mut exchange).await.unwrap();
        assert!(!exchange.response().headers_sent());
    }

    #[test]
    fn test_stage_names_and_count() {
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let pipeline = Pipeline::builder()
            .stage(tracking("first", &counter, &order, Flow::Continue))
            .stage(tracking("second", &counter, &order, Flow::Continue))
            .build();

        assert_eq!(pipeline.stage_names(), vec!["first", "second"]);
        assert_eq!(pipeline.stage_count(), 2);
    }
}
