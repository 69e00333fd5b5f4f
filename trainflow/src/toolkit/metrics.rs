//! Binary classification metrics.

use crate::data::Table;
use crate::errors::{PipelineError, ToolkitError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Headline metrics of a binary classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Fraction of correct predictions.
    pub accuracy: f64,
    /// `tp / (tp + fp)`, 0 when nothing was predicted positive.
    pub precision: f64,
    /// `tp / (tp + fn)`, 0 when there are no positives.
    pub recall: f64,
    /// Harmonic mean of precision and recall, 0 when both are 0.
    pub f1: f64,
    /// Area under the ROC curve of the positive-class scores.
    pub roc_auc: f64,
}

impl ClassificationMetrics {
    /// Computes every metric from true labels, predicted labels and
    /// positive-class scores.
    ///
    /// When `y_true` holds a single class the ROC-AUC is undefined; it is
    /// reported as 0.5 and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError` if the inputs are empty or differ in length.
    pub fn compute(
        y_true: &Array1<u8>,
        y_pred: &Array1<u8>,
        y_score: &Array1<f64>,
    ) -> Result<Self, ToolkitError> {
        let cm = ConfusionMatrix::from_labels(y_true, y_pred)?;
        if y_score.len() != y_true.len() {
            return Err(ToolkitError::ShapeMismatch(format!(
                "{} labels but {} scores",
                y_true.len(),
                y_score.len()
            )));
        }

        let precision = ratio(cm.true_positive, cm.true_positive + cm.false_positive);
        let recall = ratio(cm.true_positive, cm.true_positive + cm.false_negative);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        let roc_auc = roc_auc(y_true, y_score).unwrap_or_else(|| {
            warn!(samples = y_true.len(), "Only one class present in labels, reporting ROC-AUC as 0.5");
            0.5
        });

        Ok(Self {
            accuracy: ratio(cm.true_positive + cm.true_negative, cm.total()),
            precision,
            recall,
            f1,
            roc_auc,
        })
    }
}

/// Counts of a 2×2 confusion matrix, negatives first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Actual 0, predicted 0.
    pub true_negative: usize,
    /// Actual 0, predicted 1.
    pub false_positive: usize,
    /// Actual 1, predicted 0.
    pub false_negative: usize,
    /// Actual 1, predicted 1.
    pub true_positive: usize,
}

impl ConfusionMatrix {
    /// Tallies paired labels.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError` if the inputs are empty or differ in length.
    pub fn from_labels(y_true: &Array1<u8>, y_pred: &Array1<u8>) -> Result<Self, ToolkitError> {
        if y_true.is_empty() {
            return Err(ToolkitError::EmptyInput("no labels to compare".into()));
        }
        if y_true.len() != y_pred.len() {
            return Err(ToolkitError::ShapeMismatch(format!(
                "{} true labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }

        let mut cm = Self::default();
        for (&actual, &predicted) in y_true.iter().zip(y_pred) {
            match (actual > 0, predicted > 0) {
                (false, false) => cm.true_negative += 1,
                (false, true) => cm.false_positive += 1,
                (true, false) => cm.false_negative += 1,
                (true, true) => cm.true_positive += 1,
            }
        }
        Ok(cm)
    }

    /// Number of pairs tallied.
    #[must_use]
    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    /// Labelled table: rows `Actual Negative/Positive`, columns
    /// `Predicted Negative/Positive`, blank corner header.
    #[must_use]
    pub fn to_table(&self) -> Table {
        Table::from_parts(
            vec![
                String::new(),
                "Predicted Negative".to_string(),
                "Predicted Positive".to_string(),
            ],
            vec![
                vec![
                    "Actual Negative".to_string(),
                    self.true_negative.to_string(),
                    self.false_positive.to_string(),
                ],
                vec![
                    "Actual Positive".to_string(),
                    self.false_negative.to_string(),
                    self.true_positive.to_string(),
                ],
            ],
        )
    }

    /// Writes the labelled table as CSV.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the write fails.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        crate::data::ensure_parent(path)?;
        self.to_table().write_csv(path)
    }
}

/// Fraction of correct predictions.
///
/// # Errors
///
/// Returns `ToolkitError` if the inputs are empty or differ in length.
pub fn accuracy(y_true: &Array1<u8>, y_pred: &Array1<u8>) -> Result<f64, ToolkitError> {
    let cm = ConfusionMatrix::from_labels(y_true, y_pred)?;
    Ok(ratio(cm.true_positive + cm.true_negative, cm.total()))
}

/// Rank-based ROC-AUC (Mann-Whitney U), averaging ranks over tied scores.
///
/// Returns `None` when only one class is present.
#[must_use]
pub fn roc_auc(y_true: &Array1<u8>, y_score: &Array1<f64>) -> Option<f64> {
    let positives = y_true.iter().filter(|&&y| y > 0).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[a].total_cmp(&y_score[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && y_score[order[end]] == y_score[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; tied scores share the mean of their ranks.
        #[allow(clippy::cast_precision_loss)]
        let mean_rank = (start + 1 + end) as f64 / 2.0;
        let tied_positives = order[start..end].iter().filter(|&&i| y_true[i] > 0).count();
        #[allow(clippy::cast_precision_loss)]
        {
            positive_rank_sum += mean_rank * tied_positives as f64;
        }
        start = end;
    }

    #[allow(clippy::cast_precision_loss)]
    let (p, n) = (positives as f64, negatives as f64);
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
