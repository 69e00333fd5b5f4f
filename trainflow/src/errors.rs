//! Error types for the trainflow pipeline.
//!
//! Every stage failure reaches the runner as a [`StageError`] wrapping one of
//! the more specific errors below. The runner never inspects the cause; it
//! only decides whether attempts remain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Boxed error used for lower-level causes (I/O, network, serialization).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for trainflow operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required columns were missing from an extracted table.
    #[error("{0}")]
    SchemaValidation(#[from] SchemaValidationError),

    /// A save source was not a regular file, or the artifact type is unknown.
    #[error("{0}")]
    InvalidSource(#[from] InvalidSourceError),

    /// Filesystem, network or serialization failure.
    #[error("{0}")]
    Io(#[from] IoError),

    /// The data itself could not be interpreted.
    #[error("{0}")]
    InvalidData(#[from] InvalidDataError),

    /// A numerical routine rejected its input.
    #[error("{0}")]
    Toolkit(#[from] ToolkitError),

    /// A stage failed.
    #[error("{0}")]
    Stage(#[from] StageError),

    /// The pipeline definition is invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A whole run ended in the failed state.
    #[error("Run {run_id} failed at stage '{stage}': {message}")]
    RunFailed {
        /// The run that failed.
        run_id: Uuid,
        /// The stage that exhausted its attempts (or where the run was abandoned).
        stage: String,
        /// Last error message recorded for that stage.
        message: String,
    },
}

impl PipelineError {
    /// Short machine-friendly name of the error category.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SchemaValidation(_) => "schema_validation",
            Self::InvalidSource(_) => "invalid_source",
            Self::Io(_) => "io",
            Self::InvalidData(_) => "invalid_data",
            Self::Toolkit(_) => "toolkit",
            Self::Stage(_) => "stage",
            Self::Validation(_) => "validation",
            Self::Config(_) => "config",
            Self::RunFailed { .. } => "run_failed",
        }
    }
}

/// Raised when an extracted table lacks required columns.
#[derive(Debug, Clone, Error)]
#[error("Schema validation failed: missing columns [{}]", missing.join(", "))]
pub struct SchemaValidationError {
    /// Every required column that was not found, in schema order.
    pub missing: Vec<String>,
}

impl SchemaValidationError {
    /// Creates a new schema validation error.
    #[must_use]
    pub fn new(missing: Vec<String>) -> Self {
        Self { missing }
    }
}

/// Raised when an artifact cannot be saved because of its source.
#[derive(Debug, Clone, Error)]
pub enum InvalidSourceError {
    /// The source path does not point at a regular file.
    #[error("Source path must be a regular file: {}", path.display())]
    NotAFile {
        /// The offending path.
        path: PathBuf,
    },

    /// The artifact type tag is not one of the known types.
    #[error("Unsupported artifact type '{tag}' (expected one of: model, metrics, plots)")]
    UnknownArtifactType {
        /// The tag as given.
        tag: String,
    },
}

/// Filesystem, network or serialization failure with context.
#[derive(Debug, Error)]
#[error("I/O error while {action} '{}': {source}", path.display())]
pub struct IoError {
    /// What was being done ("copying", "downloading", ...).
    pub action: String,
    /// The path (or URL) involved.
    pub path: PathBuf,
    /// The underlying cause.
    #[source]
    pub source: BoxError,
}

impl IoError {
    /// Creates a new I/O error.
    pub fn new(
        action: impl Into<String>,
        path: impl AsRef<Path>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            action: action.into(),
            path: path.as_ref().to_path_buf(),
            source: source.into(),
        }
    }
}

/// Raised when input data cannot be interpreted.
#[derive(Debug, Clone, Error)]
pub enum InvalidDataError {
    /// The target column holds a value outside the configured mapping.
    #[error("Unrecognized target value '{value}' in column '{column}' at row {row}")]
    UnknownLabel {
        /// Target column name.
        column: String,
        /// Zero-based data row.
        row: usize,
        /// The raw cell value.
        value: String,
    },

    /// A feature cell could not be parsed as a number.
    #[error("Non-numeric value '{value}' in column '{column}' at row {row}")]
    NonNumeric {
        /// Column name.
        column: String,
        /// Zero-based data row.
        row: usize,
        /// The raw cell value.
        value: String,
    },

    /// A column required by the transformation is absent.
    #[error("Column '{0}' not found")]
    MissingColumn(String),

    /// Too few rows to produce the requested partitions.
    #[error("Not enough rows: {0}")]
    NotEnoughRows(String),
}

/// Raised by the model toolkit.
#[derive(Debug, Clone, Error)]
pub enum ToolkitError {
    /// Input arrays have incompatible shapes.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Input is empty where data is required.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A hyperparameter is out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A background fit panicked or was cancelled before finishing.
    #[error("Fit interrupted: {0}")]
    Interrupted(String),
}

/// Error raised when a stage fails, tagged with the stage name.
#[derive(Debug, Error)]
#[error("Stage '{stage}' failed: {cause}")]
pub struct StageError {
    /// Stage that failed.
    pub stage: String,
    /// Original error.
    #[source]
    pub cause: Box<PipelineError>,
}

impl StageError {
    /// Creates a new stage error.
    pub fn new(stage: impl Into<String>, cause: impl Into<PipelineError>) -> Self {
        Self {
            stage: stage.into(),
            cause: Box::new(cause.into()),
        }
    }

    /// Returns the category of the wrapped cause.
    #[must_use]
    pub fn cause_kind(&self) -> &'static str {
        self.cause.kind()
    }
}

/// Error raised when a pipeline definition is inconsistent.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Additional context key-value pairs.
    pub context: HashMap<String, String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            context: HashMap::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read or parsed.
    #[error("Failed to load config from '{}': {source}", path.display())]
    Load {
        /// Config path.
        path: PathBuf,
        /// Cause.
        #[source]
        source: BoxError,
    },

    /// A field holds an invalid value.
    #[error("Invalid config value for '{field}': {reason}")]
    InvalidValue {
        /// Dotted field name.
        field: String,
        /// Why it is invalid.
        reason: String,
    },

    /// A schedule expression could not be parsed.
    #[error("Invalid schedule expression '{0}'")]
    InvalidSchedule(String),

    /// The logging subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl ConfigError {
    /// Creates an invalid value error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_validation_lists_every_column() {
        let err = SchemaValidationError::new(vec!["id".to_string(), "radius_mean".to_string()]);
        assert!(err.to_string().contains("id, radius_mean"));
    }

    #[test]
    fn test_stage_error_wraps_cause() {
        let err = StageError::new(
            "extract",
            SchemaValidationError::new(vec!["diagnosis".to_string()]),
        );

        assert_eq!(err.stage, "extract");
        assert_eq!(err.cause_kind(), "schema_validation");
        assert!(err.to_string().contains("Stage 'extract' failed"));
        assert!(err.to_string().contains("diagnosis"));
    }

    #[test]
    fn test_io_error_display() {
        let err = IoError::new(
            "copying",
            "/tmp/model.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("copying"));
        assert!(msg.contains("/tmp/model.json"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn test_invalid_source_display() {
        let err = InvalidSourceError::UnknownArtifactType { tag: "logs".to_string() };
        assert!(err.to_string().contains("logs"));

        let pipeline_err: PipelineError = err.into();
        assert_eq!(pipeline_err.kind(), "invalid_source");
    }

    #[test]
    fn test_validation_error_context() {
        let err = PipelineValidationError::new("shared output")
            .with_stages(vec!["a".to_string(), "b".to_string()])
            .with_context_entry("path", "out.json");

        assert_eq!(err.stages.len(), 2);
        assert_eq!(err.context.get("path"), Some(&"out.json".to_string()));
    }
}
