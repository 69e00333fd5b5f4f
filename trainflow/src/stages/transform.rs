//! Transform stage: encode the target, split, scale and write the bundle.

use super::Stage;
use crate::context::StageContext;
use crate::core::{StageKind, StageOutput};
use crate::data::{DataBundle, Table};
use crate::errors::{InvalidDataError, PipelineError, ToolkitError};
use crate::toolkit::{train_test_split, StandardScaler};
use async_trait::async_trait;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info};

/// Two-value encoding of the categorical target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMapping {
    /// Target column name.
    #[serde(default = "default_target_column")]
    pub column: String,
    /// Raw value encoded as 1.
    #[serde(default = "default_positive")]
    pub positive: String,
    /// Raw value encoded as 0.
    #[serde(default = "default_negative")]
    pub negative: String,
}

fn default_target_column() -> String {
    "diagnosis".to_string()
}

fn default_positive() -> String {
    "M".to_string()
}

fn default_negative() -> String {
    "B".to_string()
}

impl Default for TargetMapping {
    fn default() -> Self {
        Self {
            column: default_target_column(),
            positive: default_positive(),
            negative: default_negative(),
        }
    }
}

impl TargetMapping {
    fn encode(&self, row: usize, value: &str) -> Result<u8, InvalidDataError> {
        if value == self.positive {
            Ok(1)
        } else if value == self.negative {
            Ok(0)
        } else {
            Err(InvalidDataError::UnknownLabel {
                column: self.column.clone(),
                row,
                value: value.to_string(),
            })
        }
    }
}

/// Settings of the transform stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformOptions {
    /// Fraction of rows held out for testing.
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Seed of the row shuffle.
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    /// Target encoding.
    #[serde(default)]
    pub target: TargetMapping,
    /// Columns removed before parsing features; absent ones are ignored.
    #[serde(default = "default_drop_columns")]
    pub drop_columns: Vec<String>,
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_random_seed() -> u64 {
    42
}

fn default_drop_columns() -> Vec<String> {
    vec!["id".to_string(), "Unnamed: 32".to_string()]
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            random_seed: default_random_seed(),
            target: TargetMapping::default(),
            drop_columns: default_drop_columns(),
        }
    }
}

/// Turns a validated raw table into a scaled train/test bundle.
///
/// The scaler is fitted on the training rows only and then applied to both
/// partitions.
///
/// # Errors
///
/// Returns `InvalidDataError` for a missing target column, an unmapped target
/// value or a non-numeric feature cell, and `ToolkitError` if the rows cannot
/// be split.
pub fn transform_table(
    table: &Table,
    options: &TransformOptions,
) -> Result<(DataBundle, StandardScaler), PipelineError> {
    let target_index = table
        .column_index(&options.target.column)
        .ok_or_else(|| InvalidDataError::MissingColumn(options.target.column.clone()))?;
    let labels = table
        .column(target_index)
        .enumerate()
        .map(|(row, value)| options.target.encode(row, value))
        .collect::<Result<Vec<u8>, _>>()?;

    let mut dropped = options.drop_columns.clone();
    dropped.push(options.target.column.clone());
    let features = table.drop_columns(&dropped);
    if features.column_count() == 0 {
        return Err(ToolkitError::EmptyInput("no feature columns remain".into()).into());
    }

    let mut values = Vec::with_capacity(features.row_count() * features.column_count());
    for (row, cells) in features.rows().iter().enumerate() {
        for (column, cell) in features.headers().iter().zip(cells) {
            let value: f64 = cell.parse().map_err(|_| InvalidDataError::NonNumeric {
                column: column.clone(),
                row,
                value: cell.clone(),
            })?;
            values.push(value);
        }
    }
    let x = Array2::from_shape_vec((features.row_count(), features.column_count()), values)
        .map_err(|e| ToolkitError::ShapeMismatch(e.to_string()))?;
    let y = Array1::from(labels);

    let split = train_test_split(x.nrows(), options.test_fraction, options.random_seed)?;
    let x_train = x.select(Axis(0), &split.train);
    let x_test = x.select(Axis(0), &split.test);
    let scaler = StandardScaler::fit(&x_train)?;

    let bundle = DataBundle {
        feature_names: features.headers().to_vec(),
        x_train: scaler.transform(&x_train)?,
        y_train: y.select(Axis(0), &split.train),
        x_test: scaler.transform(&x_test)?,
        y_test: y.select(Axis(0), &split.test),
        train_rows: split.train,
        test_rows: split.test,
    };
    Ok((bundle, scaler))
}

/// Reads the raw CSV and writes the train/test bundle (and optionally the
/// fitted scaler).
#[derive(Debug, Clone)]
pub struct TransformStage {
    input_path: PathBuf,
    train_output_path: PathBuf,
    scaler_output_path: Option<PathBuf>,
    options: TransformOptions,
}

impl TransformStage {
    /// Creates a transform stage with default options.
    #[must_use]
    pub fn new(input_path: impl Into<PathBuf>, train_output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            train_output_path: train_output_path.into(),
            scaler_output_path: None,
            options: TransformOptions::default(),
        }
    }

    /// Also writes the fitted scaler.
    #[must_use]
    pub fn with_scaler_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.scaler_output_path = Some(path.into());
        self
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    fn run(&self) -> Result<StageOutput, PipelineError> {
        let table = Table::read_csv(&self.input_path)?;
        let (bundle, scaler) = transform_table(&table, &self.options)?;
        bundle.save(&self.train_output_path)?;

        let mut output = StageOutput::with_outputs([self.train_output_path.clone()])
            .add_data("train_rows", serde_json::json!(bundle.train_rows.len()))
            .add_data("test_rows", serde_json::json!(bundle.test_rows.len()))
            .add_data("features", serde_json::json!(bundle.feature_names.len()));
        if let Some(path) = &self.scaler_output_path {
            scaler.save(path)?;
            output = output.add_output(path.clone());
        }

        info!(
            train_rows = bundle.train_rows.len(),
            test_rows = bundle.test_rows.len(),
            path = %self.train_output_path.display(),
            "Wrote train/test bundle"
        );
        Ok(output)
    }
}

#[async_trait]
impl Stage for TransformStage {
    fn name(&self) -> &str {
        "transform"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn inputs(&self) -> Vec<PathBuf> {
        vec![self.input_path.clone()]
    }

    fn outputs(&self) -> Vec<PathBuf> {
        let mut outputs = vec![self.train_output_path.clone()];
        outputs.extend(self.scaler_output_path.clone());
        outputs
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        self.run().map_err(|e| {
            error!(stage = "transform", path = %self.input_path.display(), error = %e, "Transformation failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn raw_table() -> Table {
        let headers = ["id", "diagnosis", "radius_mean", "area_mean", "Unnamed: 32"]
            .map(String::from)
            .to_vec();
        let rows = (0..10)
            .map(|i| {
                let label = if i < 2 { "M" } else { "B" };
                vec![
                    format!("{}", 1000 + i),
                    label.to_string(),
                    format!("{}.5", 10 + i),
                    format!("{}", 400 + 25 * i),
                    String::new(),
                ]
            })
            .collect();
        Table::new(headers, rows).unwrap()
    }

    #[test]
    fn test_transform_drops_columns_and_encodes_target() {
        let (bundle, _) = transform_table(&raw_table(), &TransformOptions::default()).unwrap();

        assert_eq!(bundle.feature_names, vec!["radius_mean", "area_mean"]);
        assert_eq!(bundle.x_test.nrows(), 2);
        assert_eq!(bundle.x_train.nrows(), 8);

        let positives = bundle.y_train.iter().chain(bundle.y_test.iter()).filter(|&&y| y == 1).count();
        assert_eq!(positives, 2);
        for (&row, &label) in bundle.train_rows.iter().zip(bundle.y_train.iter()) {
            assert_eq!(label, u8::from(row < 2));
        }
    }

    #[test]
    fn test_transform_is_deterministic() {
        let options = TransformOptions::default();
        let (a, _) = transform_table(&raw_table(), &options).unwrap();
        let (b, _) = transform_table(&raw_table(), &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_scaler_ignores_test_partition() {
        let options = TransformOptions::default();
        let table = raw_table();
        let (bundle, scaler) = transform_table(&table, &options).unwrap();

        // Perturb only the test rows; the fitted scaler must not move.
        let mut rows = table.rows().to_vec();
        for &r in &bundle.test_rows {
            rows[r][2] = "999.0".to_string();
        }
        let perturbed = Table::new(table.headers().to_vec(), rows).unwrap();
        let (_, scaler_after) = transform_table(&perturbed, &options).unwrap();

        assert_eq!(scaler, scaler_after);
        let train_means = bundle.x_train.mean_axis(Axis(0)).unwrap();
        assert!(train_means.iter().all(|m| m.abs() < 1e-9));
    }

    #[test]
    fn test_unknown_label_fails_fast() {
        let table = raw_table();
        let mut rows = table.rows().to_vec();
        rows[4][1] = "X".to_string();
        let table = Table::new(table.headers().to_vec(), rows).unwrap();

        let err = transform_table(&table, &TransformOptions::default()).unwrap_err();
        match err {
            PipelineError::InvalidData(InvalidDataError::UnknownLabel { row, value, .. }) => {
                assert_eq!(row, 4);
                assert_eq!(value, "X");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_feature_rejected() {
        let table = raw_table();
        let mut rows = table.rows().to_vec();
        rows[7][3] = "n/a".to_string();
        let table = Table::new(table.headers().to_vec(), rows).unwrap();

        let err = transform_table(&table, &TransformOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidData(InvalidDataError::NonNumeric { row: 7, .. })
        ));
    }

    #[tokio::test]
    async fn test_stage_writes_bundle_and_scaler() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("raw.csv");
        raw_table().write_csv(&input).unwrap();
        let bundle_path = tmp.path().join("processed").join("bundle.json");
        let scaler_path = tmp.path().join("processed").join("scaler.json");

        let stage = TransformStage::new(&input, &bundle_path).with_scaler_output(&scaler_path);
        assert_eq!(stage.outputs(), vec![bundle_path.clone(), scaler_path.clone()]);

        let output = stage.execute(&StageContext::standalone("transform")).await.unwrap();
        assert_eq!(output.get("test_rows"), Some(&serde_json::json!(2)));

        let bundle = DataBundle::load(&bundle_path).unwrap();
        let scaler = StandardScaler::load(&scaler_path).unwrap();
        assert_eq!(scaler.mean.len(), bundle.feature_names.len());
    }
}
