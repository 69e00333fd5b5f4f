//! Stage status, stage kind and run state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of work a stage performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Fetches the raw dataset and validates its columns.
    Extract,
    /// Encodes, splits and scales the raw table.
    Transform,
    /// Searches hyperparameters and fits the model.
    Train,
    /// Scores the fitted model on the held-out partition.
    Evaluate,
    /// Copies an artifact into the versioned store.
    Save,
    /// Any other stage (closures, test doubles).
    Custom,
}

impl Default for StageKind {
    fn default() -> Self {
        Self::Custom
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extract => write!(f, "extract"),
            Self::Transform => write!(f, "transform"),
            Self::Train => write!(f, "train"),
            Self::Evaluate => write!(f, "evaluate"),
            Self::Save => write!(f, "save"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// The execution status of a stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started.
    Pending,
    /// Stage is currently executing (or waiting between attempts).
    Running,
    /// Stage completed successfully.
    Succeeded,
    /// Stage exhausted its attempts.
    Failed,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// State machine of a pipeline run.
///
/// `Pending → Running(i) → {Running(i+1) | Retrying(i) | Failed}`; the
/// terminal states are `Succeeded` and `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Created, no stage started yet.
    Pending,
    /// A stage is executing.
    Running {
        /// Stage name.
        stage: String,
    },
    /// A stage failed and is waiting for its next attempt.
    Retrying {
        /// Stage name.
        stage: String,
        /// The attempt that will run next (1-based).
        next_attempt: u32,
    },
    /// Every stage succeeded.
    Succeeded,
    /// A stage exhausted its attempts, or the run was abandoned before it.
    Failed {
        /// Stage where the run stopped.
        stage: String,
    },
}

impl Default for RunState {
    fn default() -> Self {
        Self::Pending
    }
}

impl RunState {
    /// Returns true for `Succeeded` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }

    /// Short label for logs and events.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running { .. } => "running",
            Self::Retrying { .. } => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running { stage } => write!(f, "running({stage})"),
            Self::Retrying { stage, next_attempt } => {
                write!(f, "retrying({stage}, attempt {next_attempt})")
            }
            Self::Failed { stage } => write!(f, "failed({stage})"),
            other => write!(f, "{}", other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Extract.to_string(), "extract");
        assert_eq!(StageKind::Evaluate.to_string(), "evaluate");
        assert_eq!(StageKind::Save.to_string(), "save");
    }

    #[test]
    fn test_stage_status_is_terminal() {
        assert!(StageStatus::Succeeded.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Succeeded).unwrap();
        assert_eq!(json, r#""succeeded""#);
    }

    #[test]
    fn test_run_state_serialize_tagged() {
        let state = RunState::Retrying {
            stage: "train".to_string(),
            next_attempt: 2,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "retrying");
        assert_eq!(json["stage"], "train");
        assert_eq!(json["next_attempt"], 2);
    }

    #[test]
    fn test_run_state_terminal() {
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed { stage: "x".to_string() }.is_terminal());
        assert!(!RunState::Pending.is_terminal());
        assert_eq!(
            RunState::Running { stage: "extract".to_string() }.to_string(),
            "running(extract)"
        );
    }
}
