//! Pipeline run record.

use super::{RunState, StageResult, StageStatus};
use crate::errors::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What caused a run to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    /// Started explicitly (CLI `run`, API call).
    Manual,
    /// Started by the scheduler at a fire time.
    Scheduled,
}

/// One execution of the fixed stage sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Name of the pipeline.
    pub pipeline: String,
    /// What started the run.
    pub trigger: RunTrigger,
    /// Current state.
    pub state: RunState,
    /// One result per stage, in execution order.
    pub stages: Vec<StageResult>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time the run reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Creates a pending run with every stage pending.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        pipeline: impl Into<String>,
        trigger: RunTrigger,
        stages: Vec<StageResult>,
    ) -> Self {
        Self {
            run_id,
            pipeline: pipeline.into(),
            trigger,
            state: RunState::Pending,
            stages,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Looks up a stage result by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Returns true if the run finished successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == RunState::Succeeded
    }

    /// Returns true if the run ended in the failed state.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.state, RunState::Failed { .. })
    }

    /// Number of stages that have not been started.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Pending)
            .count()
    }

    /// Total attempts across all stages.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.stages.iter().map(|s| s.attempts).sum()
    }

    /// Marks the run as terminal.
    pub(crate) fn finish(&mut self, state: RunState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }

    /// Converts a failed run into an error for callers that propagate.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::RunFailed` if the run did not succeed.
    pub fn ensure_succeeded(self) -> Result<Self, PipelineError> {
        match &self.state {
            RunState::Succeeded => Ok(self),
            RunState::Failed { stage } => {
                let message = self
                    .stage(stage)
                    .and_then(|s| s.error.clone())
                    .unwrap_or_else(|| "run abandoned".to_string());
                Err(PipelineError::RunFailed {
                    run_id: self.run_id,
                    stage: stage.clone(),
                    message,
                })
            }
            other => Err(PipelineError::RunFailed {
                run_id: self.run_id,
                stage: String::new(),
                message: format!("run is not finished (state: {other})"),
            }),
        }
    }
}
