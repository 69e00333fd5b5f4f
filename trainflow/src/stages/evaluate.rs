//! Evaluate stage: score the model on the held-out partition.

use super::Stage;
use crate::context::StageContext;
use crate::core::{StageKind, StageOutput};
use crate::data::{write_json, DataBundle};
use crate::errors::{IoError, PipelineError};
use crate::toolkit::{ClassificationMetrics, ConfusionMatrix, LogisticModel};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{error, info};

/// Computes test metrics and the confusion matrix of a trained model.
#[derive(Debug, Clone)]
pub struct EvaluateStage {
    input_path: PathBuf,
    model_input_path: PathBuf,
    metrics_output_path: PathBuf,
    confusion_matrix_output_path: Option<PathBuf>,
}

impl EvaluateStage {
    /// Creates an evaluate stage.
    #[must_use]
    pub fn new(
        input_path: impl Into<PathBuf>,
        model_input_path: impl Into<PathBuf>,
        metrics_output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            model_input_path: model_input_path.into(),
            metrics_output_path: metrics_output_path.into(),
            confusion_matrix_output_path: None,
        }
    }

    /// Also writes the confusion matrix CSV.
    #[must_use]
    pub fn with_confusion_matrix_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.confusion_matrix_output_path = Some(path.into());
        self
    }

    /// Loads the bundle and model and computes the metrics.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if an input is unreadable and `ToolkitError` if the
    /// model does not fit the bundle's features.
    pub fn evaluate(&self) -> Result<(ClassificationMetrics, ConfusionMatrix), PipelineError> {
        let bundle = DataBundle::load(&self.input_path)?;
        let model = LogisticModel::load(&self.model_input_path)?;

        let scores = model.predict_proba(&bundle.x_test)?;
        let predicted = scores.mapv(|p| u8::from(p >= 0.5));
        let metrics = ClassificationMetrics::compute(&bundle.y_test, &predicted, &scores)?;
        let matrix = ConfusionMatrix::from_labels(&bundle.y_test, &predicted)?;
        Ok((metrics, matrix))
    }

    fn run(&self) -> Result<StageOutput, PipelineError> {
        let (metrics, matrix) = self.evaluate()?;
        write_json(&self.metrics_output_path, &metrics)?;

        let summary = serde_json::to_value(metrics)
            .map_err(|e| IoError::new("serializing", &self.metrics_output_path, e))?;
        let mut output = StageOutput::with_outputs([self.metrics_output_path.clone()]).add_data("metrics", summary);
        if let Some(path) = &self.confusion_matrix_output_path {
            matrix.write_csv(path)?;
            output = output.add_output(path.clone());
        }

        info!(
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1,
            roc_auc = metrics.roc_auc,
            "Evaluation finished"
        );
        Ok(output)
    }
}

#[async_trait]
impl Stage for EvaluateStage {
    fn name(&self) -> &str {
        "evaluate"
    }

    fn kind(&self) -> StageKind {
        StageKind::Evaluate
    }

    fn inputs(&self) -> Vec<PathBuf> {
        vec![self.input_path.clone(), self.model_input_path.clone()]
    }

    fn outputs(&self) -> Vec<PathBuf> {
        let mut outputs = vec![self.metrics_output_path.clone()];
        outputs.extend(self.confusion_matrix_output_path.clone());
        outputs
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        self.run().map_err(|e| {
            error!(stage = "evaluate", path = %self.model_input_path.display(), error = %e, "Evaluation failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::{LogisticParams, Penalty, Solver};
    use ndarray::array;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_evaluate_writes_metrics_and_matrix() {
        let tmp = TempDir::new().unwrap();
        let bundle_path = tmp.path().join("bundle.json");
        let model_path = tmp.path().join("model.json");
        let metrics_path = tmp.path().join("reports").join("metrics.json");
        let cm_path = tmp.path().join("reports").join("confusion_matrix.csv");

        DataBundle {
            feature_names: vec!["f0".into()],
            x_train: array![[0.0]],
            y_train: array![0],
            x_test: array![[-2.0], [-1.0], [1.0], [2.0], [0.5]],
            y_test: array![0, 0, 1, 1, 0],
            train_rows: vec![0],
            test_rows: vec![1, 2, 3, 4, 5],
        }
        .save(&bundle_path)
        .unwrap();
        LogisticModel {
            params: LogisticParams::new(1.0, Penalty::L2, Solver::ProximalGradient),
            coefficients: array![3.0],
            intercept: 0.0,
            iterations: 1,
            converged: true,
        }
        .save(&model_path)
        .unwrap();

        let stage = EvaluateStage::new(&bundle_path, &model_path, &metrics_path)
            .with_confusion_matrix_output(&cm_path);
        stage.execute(&StageContext::standalone("evaluate")).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&metrics_path).unwrap()).unwrap();
        for key in ["accuracy", "precision", "recall", "f1", "roc_auc"] {
            let v = json[key].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&v), "{key} = {v}");
        }
        assert!((json["accuracy"].as_f64().unwrap() - 0.8).abs() < 1e-12);
        assert!((json["recall"].as_f64().unwrap() - 1.0).abs() < 1e-12);

        let csv = std::fs::read_to_string(&cm_path).unwrap();
        assert!(csv.contains("Actual Negative,2,1"));
        assert!(csv.contains("Actual Positive,0,2"));
    }

    #[tokio::test]
    async fn test_feature_mismatch_is_toolkit_error() {
        let tmp = TempDir::new().unwrap();
        let bundle_path = tmp.path().join("bundle.json");
        let model_path = tmp.path().join("model.json");

        DataBundle {
            feature_names: vec!["f0".into()],
            x_train: array![[0.0]],
            y_train: array![0],
            x_test: array![[1.0]],
            y_test: array![1],
            train_rows: vec![0],
            test_rows: vec![1],
        }
        .save(&bundle_path)
        .unwrap();
        LogisticModel {
            params: LogisticParams::new(1.0, Penalty::L1, Solver::ProximalGradient),
            coefficients: array![1.0, 2.0],
            intercept: 0.0,
            iterations: 1,
            converged: true,
        }
        .save(&model_path)
        .unwrap();

        let stage = EvaluateStage::new(&bundle_path, &model_path, tmp.path().join("m.json"));
        let err = stage.execute(&StageContext::standalone("evaluate")).await.unwrap_err();
        assert_eq!(err.kind(), "toolkit");
    }
}
