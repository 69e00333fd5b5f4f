//! Core domain model types for trainflow.
//!
//! This module contains the fundamental types used throughout the pipeline:
//! - Stage status, stage kind and run state enums
//! - Stage output and per-stage result
//! - Artifact types and records
//! - The pipeline run record

mod artifact;
mod output;
mod result;
mod run;
mod status;

pub use artifact::{ArtifactRecord, ArtifactType};
pub use output::StageOutput;
pub use result::StageResult;
pub use run::{PipelineRun, RunTrigger};
pub use status::{RunState, StageKind, StageStatus};
