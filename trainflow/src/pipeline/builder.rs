//! Pipeline builder with validation.

use super::{Pipeline, RetryPolicy, StageSpec};
use crate::config::PipelineConfig;
use crate::core::ArtifactType;
use crate::errors::PipelineValidationError;
use crate::stages::{EvaluateStage, ExtractStage, SaveStage, Stage, TrainStage, TransformStage};
use crate::store::ArtifactStore;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// `build` enforces the file-handoff rules between stages:
///
/// - every declared input is written by an earlier stage or registered as an
///   external input;
/// - no path is declared as an output by two stages;
/// - stage names are unique.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageSpec>,
    retry: RetryPolicy,
    external_inputs: HashSet<PathBuf>,
}

impl PipelineBuilder {
    /// Creates an empty builder with the default retry policy.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            retry: RetryPolicy::default(),
            external_inputs: HashSet::new(),
        }
    }

    /// Assembles the standard chain described by `config`:
    /// extract (unless skipped), transform, train, evaluate, then one save per
    /// artifact type.
    #[must_use]
    pub fn from_config(config: &PipelineConfig, store: Arc<ArtifactStore>) -> Self {
        let paths = &config.paths;
        let mut builder = Self::new(&config.name).with_retry(config.retry);

        if config.skip_extract {
            builder = builder.external_input(&paths.raw_data);
        } else {
            let source = config.extract.source_url.clone().unwrap_or_default();
            builder = builder.stage(Arc::new(
                ExtractStage::new(source, &paths.raw_data).with_schema(config.extract.schema.clone()),
            ));
        }

        let mut transform =
            TransformStage::new(&paths.raw_data, &paths.bundle).with_options(config.transform.clone());
        if let Some(scaler) = &paths.scaler {
            transform = transform.with_scaler_output(scaler);
        }

        let mut train = TrainStage::new(&paths.bundle, &paths.model).with_options(config.train.clone());
        if let Some(params) = &paths.params {
            train = train.with_params_output(params);
        }

        let evaluate = EvaluateStage::new(&paths.bundle, &paths.model, &paths.metrics)
            .with_confusion_matrix_output(&paths.confusion_matrix);

        builder
            .stage(Arc::new(transform))
            .stage(Arc::new(train))
            .stage(Arc::new(evaluate))
            .stage(Arc::new(SaveStage::new(&paths.model, ArtifactType::Model, Arc::clone(&store))))
            .stage(Arc::new(SaveStage::new(&paths.metrics, ArtifactType::Metrics, Arc::clone(&store))))
            .stage(Arc::new(SaveStage::new(&paths.confusion_matrix, ArtifactType::Plots, store)))
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(self, stage: Arc<dyn Stage>) -> Self {
        self.add_stage_spec(StageSpec::new(stage))
    }

    /// Appends a stage specification.
    #[must_use]
    pub fn add_stage_spec(mut self, spec: StageSpec) -> Self {
        self.stages.push(spec);
        self
    }

    /// Sets the pipeline-wide retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Registers a path provided out of band (no stage writes it).
    #[must_use]
    pub fn external_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.external_inputs.insert(path.into());
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Validates and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `PipelineValidationError` for an empty pipeline, a duplicate
    /// stage name, a path written by two stages, or an input nothing earlier
    /// provides.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_context_entry("pipeline", self.name.clone()));
        }

        let mut names = HashSet::new();
        for spec in &self.stages {
            if !names.insert(spec.name.as_str()) {
                return Err(PipelineValidationError::new(format!(
                    "Stage name '{}' is used more than once",
                    spec.name
                ))
                .with_stages(vec![spec.name.clone()]));
            }
        }

        let mut writers: HashMap<PathBuf, &str> = HashMap::new();
        for spec in &self.stages {
            for path in spec.outputs() {
                if let Some(previous) = writers.get(&path) {
                    return Err(PipelineValidationError::new(format!(
                        "Output '{}' is written by both '{}' and '{}'",
                        path.display(),
                        previous,
                        spec.name
                    ))
                    .with_stages(vec![(*previous).to_string(), spec.name.clone()])
                    .with_context_entry("path", path.display().to_string()));
                }
                writers.insert(path, spec.name.as_str());
            }
        }

        let mut available = self.external_inputs.clone();
        for spec in &self.stages {
            for path in spec.inputs() {
                if available.contains(&path) {
                    continue;
                }
                let mut err = PipelineValidationError::new(match writers.get(&path) {
                    Some(writer) => format!(
                        "Stage '{}' reads '{}' before stage '{}' writes it",
                        spec.name,
                        path.display(),
                        writer
                    ),
                    None => format!(
                        "Stage '{}' reads '{}' which no earlier stage writes",
                        spec.name,
                        path.display()
                    ),
                })
                .with_context_entry("path", path.display().to_string());
                err = err.with_stages(
                    std::iter::once(spec.name.clone())
                        .chain(writers.get(&path).map(|w| (*w).to_string()))
                        .collect(),
                );
                return Err(err);
            }
            available.extend(spec.outputs());
        }

        Ok(Pipeline::new(self.name, self.stages, self.retry))
    }
}
