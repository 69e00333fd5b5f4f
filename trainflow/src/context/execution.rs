//! Contexts handed to the runner and to each stage attempt.

use crate::cancellation::CancellationToken;
use crate::core::RunTrigger;
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use std::sync::Arc;
use uuid::Uuid;

/// State shared by every stage of one run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    run_id: Uuid,
    pipeline: String,
    trigger: RunTrigger,
    event_sink: Arc<dyn EventSink>,
    cancellation: Arc<CancellationToken>,
}

impl PipelineContext {
    /// Creates a context with a fresh run id, no-op sink and manual trigger.
    #[must_use]
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            trigger: RunTrigger::Manual,
            event_sink: Arc::new(NoOpEventSink),
            cancellation: Arc::new(CancellationToken::new()),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Shares an existing cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets what started the run.
    #[must_use]
    pub fn with_trigger(mut self, trigger: RunTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Pipeline name.
    #[must_use]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// What started the run.
    #[must_use]
    pub fn trigger(&self) -> RunTrigger {
        self.trigger
    }

    /// The sink every event of this run goes to.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// The run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Returns whether the run was asked to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Emits an event stamped with this run's id.
    pub async fn emit(&self, event_type: &str, stage: Option<&str>, attempt: Option<u32>, data: serde_json::Value) {
        let mut event = PipelineEvent::new(event_type, self.run_id).with_data(data);
        if let Some(stage) = stage {
            event = event.with_stage(stage);
        }
        if let Some(attempt) = attempt {
            event = event.with_attempt(attempt);
        }
        self.event_sink.emit(event).await;
    }

    /// Creates the context of one stage attempt.
    #[must_use]
    pub fn stage_context(self: &Arc<Self>, stage_name: impl Into<String>, attempt: u32) -> StageContext {
        StageContext::new(Arc::clone(self), stage_name, attempt)
    }
}

/// Context of a single stage attempt.
#[derive(Debug, Clone)]
pub struct StageContext {
    pipeline_ctx: Arc<PipelineContext>,
    stage_name: String,
    attempt: u32,
}

impl StageContext {
    /// Creates a stage context.
    #[must_use]
    pub fn new(pipeline_ctx: Arc<PipelineContext>, stage_name: impl Into<String>, attempt: u32) -> Self {
        Self {
            pipeline_ctx,
            stage_name: stage_name.into(),
            attempt,
        }
    }

    /// Context for running one stage outside a pipeline run.
    #[must_use]
    pub fn standalone(stage_name: impl Into<String>) -> Self {
        let stage_name = stage_name.into();
        Self::new(Arc::new(PipelineContext::new(stage_name.clone())), stage_name, 1)
    }

    /// Stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// One-based attempt number.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.pipeline_ctx.run_id()
    }

    /// The enclosing run's context.
    #[must_use]
    pub fn pipeline_ctx(&self) -> &Arc<PipelineContext> {
        &self.pipeline_ctx
    }

    /// Returns whether the run was asked to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.pipeline_ctx.is_cancelled()
    }

    /// Emits a stage-scoped event without awaiting.
    pub fn try_emit(&self, event_type: &str, data: serde_json::Value) {
        let event = PipelineEvent::new(event_type, self.run_id())
            .with_stage(&self.stage_name)
            .with_attempt(self.attempt)
            .with_data(data);
        self.pipeline_ctx.event_sink().try_emit(event);
    }
}
