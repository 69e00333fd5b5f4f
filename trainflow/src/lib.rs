//! # Trainflow
//!
//! A fixed-order machine-learning training pipeline with retrying stages and
//! versioned artifacts.
//!
//! Trainflow runs a linear chain of stages:
//!
//! - **Extract**: download the raw CSV and check its columns
//! - **Transform**: encode the target, split, and scale features
//! - **Train**: grid-search a logistic regression with stratified k-fold
//! - **Evaluate**: write metrics and a confusion matrix
//! - **Save**: copy each artifact into a timestamped + "latest" store
//!
//! Each stage reads and writes files, so stages can also be run one at a time
//! through [`scheduler::StageCommand`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trainflow::prelude::*;
//!
//! let config = PipelineConfig::from_file("pipeline.json")?;
//! let store = Arc::new(ArtifactStore::new(&config.paths.results_dir));
//! let pipeline = PipelineBuilder::from_config(&config, store).build()?;
//!
//! let run = pipeline.run(Arc::new(PipelineContext::new(pipeline.name()))).await;
//! run.ensure_succeeded()?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod data;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod scheduler;
pub mod stages;
pub mod store;
pub mod testing;
pub mod toolkit;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ExtractConfig, PathsConfig, PipelineConfig};
    pub use crate::context::{PipelineContext, StageContext};
    pub use crate::core::{
        ArtifactRecord, ArtifactType, PipelineRun, RunState, RunTrigger, StageKind, StageOutput,
        StageResult, StageStatus,
    };
    pub use crate::data::{DataBundle, FeatureSchema, Table};
    pub use crate::errors::{ConfigError, PipelineError, PipelineValidationError, StageError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_logging, LoggingConfig};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, RetryPolicy, StageSpec};
    pub use crate::scheduler::{PipelineScheduler, Schedule, StageCommand};
    pub use crate::stages::{
        EvaluateStage, ExtractStage, FnStage, SaveStage, Stage, TrainStage, TransformStage,
    };
    pub use crate::store::ArtifactStore;
    pub use std::sync::Arc;
}
