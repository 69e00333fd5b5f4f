//! Stage trait and implementations.
//!
//! A stage is one unit of work with declared input and output paths. Stages
//! hand data to each other only through those files, so any stage can be
//! re-run on its own from the command line.

mod evaluate;
mod extract;
mod save;
mod train;
mod transform;

pub use evaluate::EvaluateStage;
#[cfg(test)]
pub use extract::MockFetcher;
pub use extract::{ExtractStage, Fetcher, SourceFetcher};
pub use save::SaveStage;
pub use train::{TrainOptions, TrainStage};
pub use transform::{transform_table, TargetMapping, TransformOptions, TransformStage};

use crate::context::StageContext;
use crate::core::{StageKind, StageOutput};
use crate::errors::PipelineError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::PathBuf;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Unique name of the stage within a pipeline.
    fn name(&self) -> &str;

    /// What kind of work the stage does.
    fn kind(&self) -> StageKind {
        StageKind::Custom
    }

    /// Files the stage reads.
    fn inputs(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Files the stage writes.
    fn outputs(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Runs the stage once.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; the runner decides whether to
    /// retry.
    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, PipelineError>;
}

/// Function signature wrapped by [`FnStage`].
pub type StageFn = dyn Fn(&StageContext) -> Result<StageOutput, PipelineError> + Send + Sync;

/// A stage backed by a closure.
pub struct FnStage {
    name: String,
    kind: StageKind,
    inputs: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
    func: Box<StageFn>,
}

impl FnStage {
    /// Creates a custom stage with no declared paths.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&StageContext) -> Result<StageOutput, PipelineError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: StageKind::Custom,
            inputs: Vec::new(),
            outputs: Vec::new(),
            func: Box::new(func),
        }
    }

    /// Sets the stage kind.
    #[must_use]
    pub fn with_kind(mut self, kind: StageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Declares input paths.
    #[must_use]
    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    /// Declares output paths.
    #[must_use]
    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }
}

impl Debug for FnStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        self.kind
    }

    fn inputs(&self) -> Vec<PathBuf> {
        self.inputs.clone()
    }

    fn outputs(&self) -> Vec<PathBuf> {
        self.outputs.clone()
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        (self.func)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InvalidDataError;

    #[tokio::test]
    async fn test_fn_stage_success() {
        let stage = FnStage::new("custom", |ctx| {
            Ok(StageOutput::empty().add_data("stage", serde_json::json!(ctx.stage_name())))
        })
        .with_outputs(["out.json"]);

        assert_eq!(stage.name(), "custom");
        assert_eq!(stage.kind(), StageKind::Custom);
        assert_eq!(stage.outputs(), vec![PathBuf::from("out.json")]);

        let output = stage.execute(&StageContext::standalone("custom")).await.unwrap();
        assert_eq!(output.get("stage"), Some(&serde_json::json!("custom")));
    }

    #[tokio::test]
    async fn test_fn_stage_error_passes_through() {
        let stage = FnStage::new("broken", |_| Err(InvalidDataError::MissingColumn("x".into()).into()))
            .with_kind(StageKind::Transform);

        let err = stage.execute(&StageContext::standalone("broken")).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_data");
    }
}
