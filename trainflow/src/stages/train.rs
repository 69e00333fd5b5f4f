//! Train stage: grid search, refit and persist the model.

use super::Stage;
use crate::context::StageContext;
use crate::core::{StageKind, StageOutput};
use crate::data::{write_json, DataBundle};
use crate::errors::{IoError, PipelineError, ToolkitError};
use crate::toolkit::{GridSearch, GridSearchResult, LogisticRegression, ParamGrid};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info};

/// Settings of the train stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
    /// Hyperparameter grid.
    #[serde(default)]
    pub grid: ParamGrid,
    /// Number of stratified cross-validation folds.
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    /// Iteration cap of every fit.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
}

fn default_cv_folds() -> usize {
    5
}

fn default_max_iter() -> usize {
    LogisticRegression::DEFAULT_MAX_ITER
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            grid: ParamGrid::default(),
            cv_folds: default_cv_folds(),
            max_iter: default_max_iter(),
        }
    }
}

/// Searches the grid on the training partition and writes the refitted model.
#[derive(Debug, Clone)]
pub struct TrainStage {
    input_path: PathBuf,
    model_output_path: PathBuf,
    params_output_path: Option<PathBuf>,
    options: TrainOptions,
}

impl TrainStage {
    /// Creates a train stage with default options.
    #[must_use]
    pub fn new(input_path: impl Into<PathBuf>, model_output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            model_output_path: model_output_path.into(),
            params_output_path: None,
            options: TrainOptions::default(),
        }
    }

    /// Also writes the winning hyperparameters.
    #[must_use]
    pub fn with_params_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.params_output_path = Some(path.into());
        self
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: TrainOptions) -> Self {
        self.options = options;
        self
    }

    async fn run(&self) -> Result<StageOutput, PipelineError> {
        let bundle = DataBundle::load(&self.input_path)?;
        let search = GridSearch::new(self.options.grid.clone(), self.options.cv_folds)
            .with_max_iter(self.options.max_iter);

        let result: GridSearchResult =
            tokio::task::spawn_blocking(move || search.fit(&bundle.x_train, &bundle.y_train))
                .await
                .map_err(fit_interrupted)??;

        info!(
            best_params = %result.best_params,
            best_score = result.best_score,
            candidates = result.scores.len(),
            "Grid search finished"
        );

        result.model.save(&self.model_output_path)?;
        let best_params = serde_json::to_value(result.best_params)
            .map_err(|e| IoError::new("serializing best parameters for", &self.model_output_path, e))?;
        let mut output = StageOutput::with_outputs([self.model_output_path.clone()])
            .add_data("best_params", best_params)
            .add_data("best_score", serde_json::json!(result.best_score))
            .add_data("converged", serde_json::json!(result.model.converged));
        if let Some(path) = &self.params_output_path {
            write_json(path, &result.best_params)?;
            output = output.add_output(path.clone());
        }
        Ok(output)
    }
}

fn fit_interrupted(err: tokio::task::JoinError) -> PipelineError {
    let reason = if err.is_panic() { "grid search panicked" } else { "grid search was cancelled" };
    ToolkitError::Interrupted(reason.to_string()).into()
}

#[async_trait]
impl Stage for TrainStage {
    fn name(&self) -> &str {
        "train"
    }

    fn kind(&self) -> StageKind {
        StageKind::Train
    }

    fn inputs(&self) -> Vec<PathBuf> {
        vec![self.input_path.clone()]
    }

    fn outputs(&self) -> Vec<PathBuf> {
        let mut outputs = vec![self.model_output_path.clone()];
        outputs.extend(self.params_output_path.clone());
        outputs
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        self.run().await.map_err(|e| {
            error!(stage = "train", path = %self.input_path.display(), error = %e, "Training failed");
            e
        })
    }
}
