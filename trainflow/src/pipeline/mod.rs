//! Pipeline construction and execution.
//!
//! A [`PipelineBuilder`] validates the file handoff between stages and
//! produces a [`Pipeline`], whose `run` executes the stages strictly in order
//! with fixed-delay retries.

mod builder;
mod retry;
mod runner;
mod spec;

pub use builder::PipelineBuilder;
pub use retry::{RetryDecision, RetryPolicy};
pub use runner::Pipeline;
pub use spec::StageSpec;
