//! Stage doubles for exercising the runner.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::context::StageContext;
use crate::core::StageOutput;
use crate::errors::{IoError, PipelineError};
use crate::stages::Stage;

fn transient_error(stage: &str, call: usize) -> PipelineError {
    IoError::new(
        "running",
        stage,
        format!("simulated failure on call {call}"),
    )
    .into()
}

/// Succeeds every time and counts its calls.
#[derive(Debug)]
pub struct CountingStage {
    name: String,
    outputs: Vec<PathBuf>,
    calls: Arc<AtomicUsize>,
}

impl CountingStage {
    /// Creates a counting stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outputs: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Declares output paths.
    #[must_use]
    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    /// Shared call counter, readable after the stage is moved into a pipeline.
    #[must_use]
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for CountingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn outputs(&self) -> Vec<PathBuf> {
        self.outputs.clone()
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(StageOutput::with_outputs(self.outputs.clone()))
    }
}

/// Fails a fixed number of times, then succeeds.
#[derive(Debug)]
pub struct FlakyStage {
    name: String,
    failures: usize,
    calls: Arc<AtomicUsize>,
    attempts_seen: Mutex<Vec<u32>>,
}

impl FlakyStage {
    /// Creates a stage that fails its first `failures` calls.
    #[must_use]
    pub fn new(name: impl Into<String>, failures: usize) -> Self {
        Self {
            name: name.into(),
            failures,
            calls: Arc::new(AtomicUsize::new(0)),
            attempts_seen: Mutex::new(Vec::new()),
        }
    }

    /// Shared call counter.
    #[must_use]
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Attempt numbers passed in by the runner, in call order.
    #[must_use]
    pub fn attempts_seen(&self) -> Vec<u32> {
        self.attempts_seen.lock().clone()
    }
}

#[async_trait]
impl Stage for FlakyStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.attempts_seen.lock().push(ctx.attempt());
        if call <= self.failures {
            Err(transient_error(&self.name, call))
        } else {
            Ok(StageOutput::empty().add_data("calls", serde_json::json!(call)))
        }
    }
}

/// Fails on every call.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    calls: Arc<AtomicUsize>,
}

impl FailingStage {
    /// Creates an always-failing stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared call counter.
    #[must_use]
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Err(transient_error(&self.name, call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counting_stage() {
        let stage = CountingStage::new("count").with_outputs(["a.json"]);
        let ctx = StageContext::standalone("count");

        let output = stage.execute(&ctx).await.unwrap();
        stage.execute(&ctx).await.unwrap();

        assert_eq!(stage.call_count(), 2);
        assert_eq!(output.outputs, vec![PathBuf::from("a.json")]);
    }

    #[tokio::test]
    async fn test_flaky_stage_recovers() {
        let stage = FlakyStage::new("flaky", 2);
        let ctx = StageContext::standalone("flaky");

        assert!(stage.execute(&ctx).await.is_err());
        assert!(stage.execute(&ctx).await.is_err());
        assert!(stage.execute(&ctx).await.is_ok());
        assert_eq!(stage.counter().load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failing_stage() {
        let stage = FailingStage::new("fail");
        let err = stage.execute(&StageContext::standalone("fail")).await.unwrap_err();

        assert_eq!(err.kind(), "io");
        assert!(err.to_string().contains("simulated failure on call 1"));
    }
}
