//! Run and stage lifecycle events.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};

/// A run was created and is about to execute its first stage.
pub const RUN_STARTED: &str = "run.started";
/// A stage attempt began.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage attempt succeeded.
pub const STAGE_SUCCEEDED: &str = "stage.succeeded";
/// A stage attempt failed and another attempt is scheduled.
pub const STAGE_RETRYING: &str = "stage.retrying";
/// A stage exhausted its attempts.
pub const STAGE_FAILED: &str = "stage.failed";
/// A run reached a terminal state.
pub const RUN_COMPLETED: &str = "run.completed";
