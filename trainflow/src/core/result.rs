//! Per-stage result recorded in a pipeline run.

use super::{StageKind, StageOutput, StageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Typed result of one stage within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name.
    pub name: String,
    /// Stage kind.
    pub kind: StageKind,
    /// Stage status.
    pub status: StageStatus,
    /// Number of attempts made so far.
    pub attempts: u32,
    /// When the first attempt started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the stage reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Output of the successful attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<StageOutput>,
    /// Message of the last failed attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageResult {
    /// Creates a pending result for a stage that has not run.
    #[must_use]
    pub fn pending(name: impl Into<String>, kind: StageKind) -> Self {
        Self {
            name: name.into(),
            kind,
            status: StageStatus::Pending,
            attempts: 0,
            started_at: None,
            ended_at: None,
            output: None,
            error: None,
        }
    }

    /// Marks the beginning of a new attempt.
    pub fn begin_attempt(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.attempts += 1;
        self.status = StageStatus::Running;
    }

    /// Records a failed attempt without making it terminal.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Marks the stage as succeeded.
    pub fn succeed(&mut self, output: StageOutput) {
        self.status = StageStatus::Succeeded;
        self.ended_at = Some(Utc::now());
        self.output = Some(output);
        self.error = None;
    }

    /// Marks the stage as failed for good.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StageStatus::Failed;
        self.ended_at = Some(Utc::now());
        self.error = Some(error.into());
    }

    /// Returns the duration in milliseconds, if the stage finished.
    #[must_use]
    pub fn duration_ms(&self) -> Option<f64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64),
            _ => None,
        }
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StageStatus::Succeeded
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == StageStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_result() {
        let result = StageResult::pending("train", StageKind::Train);

        assert_eq!(result.status, StageStatus::Pending);
        assert_eq!(result.attempts, 0);
        assert!(result.started_at.is_none());
        assert!(result.duration_ms().is_none());
    }

    #[test]
    fn test_attempts_then_success() {
        let mut result = StageResult::pending("train", StageKind::Train);

        result.begin_attempt();
        result.record_failure("boom");
        assert_eq!(result.status, StageStatus::Running);
        assert_eq!(result.error.as_deref(), Some("boom"));

        result.begin_attempt();
        result.succeed(StageOutput::empty());

        assert!(result.is_success());
        assert_eq!(result.attempts, 2);
        assert!(result.error.is_none());
        assert!(result.duration_ms().is_some());
    }

    #[test]
    fn test_fail_is_terminal() {
        let mut result = StageResult::pending("evaluate", StageKind::Evaluate);
        result.begin_attempt();
        result.fail("model missing");

        assert!(result.is_failure());
        assert!(result.status.is_terminal());
        assert_eq!(result.error.as_deref(), Some("model missing"));
    }

    #[test]
    fn test_stage_result_serialization() {
        let mut result = StageResult::pending("save_model", StageKind::Save);
        result.begin_attempt();
        result.succeed(StageOutput::empty());

        let json = serde_json::to_string(&result).unwrap();
        let deserialized: StageResult = serde_json::from_str(&json).unwrap();

        assert_eq!(result.name, deserialized.name);
        assert_eq!(result.status, deserialized.status);
        assert_eq!(deserialized.attempts, 1);
    }
}
