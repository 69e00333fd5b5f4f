//! Stage commands: the structured invocation contract of every stage.
//!
//! An external scheduler (or the CLI) describes one stage run as a
//! `StageCommand` and executes it once. Retries are left to the caller.

use crate::context::StageContext;
use crate::core::{ArtifactType, StageOutput};
use crate::errors::PipelineError;
use crate::stages::{EvaluateStage, ExtractStage, SaveStage, Stage, TrainStage, TransformOptions, TransformStage};
use crate::store::ArtifactStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// One stage invocation with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum StageCommand {
    /// Download and validate the raw dataset.
    Extract {
        /// Dataset location.
        source_url: String,
        /// Where the raw CSV is written.
        output: PathBuf,
    },
    /// Encode, split and scale the raw dataset.
    Transform {
        /// Raw CSV.
        input: PathBuf,
        /// Bundle output.
        train_output: PathBuf,
        /// Held-out fraction.
        #[serde(default = "default_test_fraction")]
        test_fraction: f64,
        /// Shuffle seed.
        #[serde(default = "default_random_seed")]
        random_seed: u64,
        /// Optional scaler output.
        #[serde(default)]
        scaler_output: Option<PathBuf>,
    },
    /// Grid-search and fit the classifier.
    Train {
        /// Bundle input.
        input: PathBuf,
        /// Model output.
        model_output: PathBuf,
        /// Optional best-parameters output.
        #[serde(default)]
        params_output: Option<PathBuf>,
    },
    /// Score the model on the test partition.
    Evaluate {
        /// Bundle input.
        input: PathBuf,
        /// Model input.
        model_input: PathBuf,
        /// Metrics output.
        metrics_output: PathBuf,
        /// Optional confusion matrix output.
        #[serde(default)]
        confusion_matrix_output: Option<PathBuf>,
    },
    /// Version a file in the artifact store.
    Save {
        /// File to store.
        source: PathBuf,
        /// Artifact type.
        #[serde(rename = "type")]
        artifact_type: ArtifactType,
        /// Store root.
        #[serde(default = "default_results_dir")]
        results_dir: PathBuf,
    },
}

fn default_test_fraction() -> f64 {
    TransformOptions::default().test_fraction
}

fn default_random_seed() -> u64 {
    TransformOptions::default().random_seed
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

impl StageCommand {
    /// Name of the command.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Extract { .. } => "extract",
            Self::Transform { .. } => "transform",
            Self::Train { .. } => "train",
            Self::Evaluate { .. } => "evaluate",
            Self::Save { .. } => "save",
        }
    }

    /// Files the command reads.
    #[must_use]
    pub fn declared_inputs(&self) -> Vec<PathBuf> {
        match self {
            Self::Extract { .. } => Vec::new(),
            Self::Transform { input, .. } | Self::Train { input, .. } => vec![input.clone()],
            Self::Evaluate { input, model_input, .. } => vec![input.clone(), model_input.clone()],
            Self::Save { source, .. } => vec![source.clone()],
        }
    }

    /// Files the command writes. Store copies are not listed; their names
    /// depend on the save time.
    #[must_use]
    pub fn declared_outputs(&self) -> Vec<PathBuf> {
        match self {
            Self::Extract { output, .. } => vec![output.clone()],
            Self::Transform {
                train_output,
                scaler_output,
                ..
            } => std::iter::once(train_output.clone()).chain(scaler_output.clone()).collect(),
            Self::Train {
                model_output,
                params_output,
                ..
            } => std::iter::once(model_output.clone()).chain(params_output.clone()).collect(),
            Self::Evaluate {
                metrics_output,
                confusion_matrix_output,
                ..
            } => std::iter::once(metrics_output.clone())
                .chain(confusion_matrix_output.clone())
                .collect(),
            Self::Save { .. } => Vec::new(),
        }
    }

    /// Builds the stage this command describes.
    #[must_use]
    pub fn into_stage(self) -> Arc<dyn Stage> {
        match self {
            Self::Extract { source_url, output } => Arc::new(ExtractStage::new(source_url, output)),
            Self::Transform {
                input,
                train_output,
                test_fraction,
                random_seed,
                scaler_output,
            } => {
                let options = TransformOptions {
                    test_fraction,
                    random_seed,
                    ..TransformOptions::default()
                };
                let mut stage = TransformStage::new(input, train_output).with_options(options);
                if let Some(path) = scaler_output {
                    stage = stage.with_scaler_output(path);
                }
                Arc::new(stage)
            }
            Self::Train {
                input,
                model_output,
                params_output,
            } => {
                let mut stage = TrainStage::new(input, model_output);
                if let Some(path) = params_output {
                    stage = stage.with_params_output(path);
                }
                Arc::new(stage)
            }
            Self::Evaluate {
                input,
                model_input,
                metrics_output,
                confusion_matrix_output,
            } => {
                let mut stage = EvaluateStage::new(input, model_input, metrics_output);
                if let Some(path) = confusion_matrix_output {
                    stage = stage.with_confusion_matrix_output(path);
                }
                Arc::new(stage)
            }
            Self::Save {
                source,
                artifact_type,
                results_dir,
            } => Arc::new(SaveStage::new(
                source,
                artifact_type,
                Arc::new(ArtifactStore::new(results_dir)),
            )),
        }
    }

    /// Runs the command once.
    ///
    /// # Errors
    ///
    /// Returns the stage's error unchanged.
    pub async fn execute(self) -> Result<StageOutput, PipelineError> {
        let name = self.name();
        info!(command = name, "Executing stage command");
        let stage = self.into_stage();
        let ctx = StageContext::standalone(stage.name());
        stage.execute(&ctx).await
    }
}
