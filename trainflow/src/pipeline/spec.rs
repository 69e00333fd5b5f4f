//! Stage specifications held by a built pipeline.

use super::RetryPolicy;
use crate::core::StageKind;
use crate::stages::Stage;
use std::path::PathBuf;
use std::sync::Arc;

/// A stage plus the settings the runner applies to it.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The stage name, copied from the stage.
    pub name: String,
    /// The stage kind, copied from the stage.
    pub kind: StageKind,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// Per-stage override of the pipeline retry policy.
    pub retry: Option<RetryPolicy>,
}

impl StageSpec {
    /// Wraps a stage.
    #[must_use]
    pub fn new(runner: Arc<dyn Stage>) -> Self {
        Self {
            name: runner.name().to_string(),
            kind: runner.kind(),
            runner,
            retry: None,
        }
    }

    /// Overrides the retry policy for this stage only.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Declared input paths.
    #[must_use]
    pub fn inputs(&self) -> Vec<PathBuf> {
        self.runner.inputs()
    }

    /// Declared output paths.
    #[must_use]
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.runner.outputs()
    }
}
