//! Scheduler-facing interface.
//!
//! [`StageCommand`] is the structured contract for invoking a single stage;
//! [`Schedule`] and [`PipelineScheduler`] fire whole pipeline runs.

mod command;
mod schedule;
mod service;

pub use command::StageCommand;
pub use schedule::Schedule;
pub use service::{PipelineScheduler, DEFAULT_HISTORY_LIMIT};
