//! Per-feature standardization.

use crate::data::{read_json, write_json};
use crate::errors::{PipelineError, ToolkitError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Centers each feature on its training mean and divides by its training
/// standard deviation (population, `ddof = 0`).
///
/// Constant features get a scale of 1 so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-feature mean.
    pub mean: Array1<f64>,
    /// Per-feature divisor.
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Learns means and scales from `x`.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::EmptyInput` if `x` has no rows.
    pub fn fit(x: &Array2<f64>) -> Result<Self, ToolkitError> {
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| ToolkitError::EmptyInput("cannot fit a scaler on zero rows".into()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Ok(Self { mean, scale })
    }

    /// Applies the learned transformation.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::ShapeMismatch` if the column count differs from
    /// the fitted data.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ToolkitError> {
        if x.ncols() != self.mean.len() {
            return Err(ToolkitError::ShapeMismatch(format!(
                "scaler fitted on {} features, got {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        Ok((x - &self.mean) / &self.scale)
    }

    /// Writes the scaler as JSON.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        write_json(path, self)
    }

    /// Reads a scaler written by [`StandardScaler::save`].
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file is unreadable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        read_json(path)
    }
}
