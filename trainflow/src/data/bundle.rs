//! Serialized train/test partitions handed from transform to train and evaluate.

use crate::errors::{IoError, PipelineError, ToolkitError};
use ndarray::{Array1, Array2};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Scaled feature matrices and binary labels for both partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBundle {
    /// Feature column names, in matrix column order.
    pub feature_names: Vec<String>,
    /// Scaled training features.
    pub x_train: Array2<f64>,
    /// Training labels (0 or 1).
    pub y_train: Array1<u8>,
    /// Scaled test features.
    pub x_test: Array2<f64>,
    /// Test labels (0 or 1).
    pub y_test: Array1<u8>,
    /// Source row index of every training row.
    pub train_rows: Vec<usize>,
    /// Source row index of every test row.
    pub test_rows: Vec<usize>,
}

impl DataBundle {
    /// Checks that matrices, labels and row indices agree in shape.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::ShapeMismatch` describing the first disagreement.
    pub fn validate(&self) -> Result<(), ToolkitError> {
        let width = self.feature_names.len();
        for (name, x, y, rows) in [
            ("train", &self.x_train, &self.y_train, &self.train_rows),
            ("test", &self.x_test, &self.y_test, &self.test_rows),
        ] {
            if x.ncols() != width {
                return Err(ToolkitError::ShapeMismatch(format!(
                    "{name} features have {} columns, expected {width}",
                    x.ncols()
                )));
            }
            if x.nrows() != y.len() || x.nrows() != rows.len() {
                return Err(ToolkitError::ShapeMismatch(format!(
                    "{name} partition has {} rows, {} labels and {} row indices",
                    x.nrows(),
                    y.len(),
                    rows.len()
                )));
            }
        }
        Ok(())
    }

    /// Writes the bundle as JSON.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        write_json(path, self)
    }

    /// Reads and validates a bundle.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file is unreadable and `ToolkitError` if the
    /// shapes disagree.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let bundle: Self = read_json(path)?;
        bundle.validate()?;
        Ok(bundle)
    }
}

/// Writes any serializable value as pretty JSON, creating parent directories.
pub(crate) fn write_json<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    value: &T,
) -> Result<(), PipelineError> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let json =
        serde_json::to_string_pretty(value).map_err(|e| IoError::new("serializing", path, e))?;
    fs::write(path, json).map_err(|e| IoError::new("writing", path, e))?;
    Ok(())
}

/// Reads a JSON document into `T`.
pub(crate) fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, PipelineError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| IoError::new("reading", path, e))?;
    let value = serde_json::from_str(&text).map_err(|e| IoError::new("parsing", path, e))?;
    Ok(value)
}

/// Creates the parent directory of `path` if it has one.
pub(crate) fn ensure_parent(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| IoError::new("creating directory", parent, e))?;
    }
    Ok(())
}
