//! Execution contexts for runs and stage attempts.

mod execution;

pub use execution::{PipelineContext, StageContext};
