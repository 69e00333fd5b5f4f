//! Pipeline configuration loaded from a JSON file.
//!
//! Every field has a default; a file only needs a source URL (or
//! `skip_extract`) to validate.

use crate::data::FeatureSchema;
use crate::errors::ConfigError;
use crate::observability::LoggingConfig;
use crate::pipeline::RetryPolicy;
use crate::scheduler::Schedule;
use crate::stages::{TrainOptions, TransformOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration of one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name, recorded on every run.
    #[serde(default = "default_name")]
    pub name: String,
    /// Schedule expression used by `PipelineScheduler`.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    /// Leave out the extract stage; the raw file is provided out of band.
    #[serde(default)]
    pub skip_extract: bool,
    /// File locations of every intermediate and final artifact.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Extract settings.
    #[serde(default)]
    pub extract: ExtractConfig,
    /// Transform settings.
    #[serde(default)]
    pub transform: TransformOptions,
    /// Train settings.
    #[serde(default)]
    pub train: TrainOptions,
    /// Retry policy applied to every stage.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_name() -> String {
    "breast_cancer_ml_pipeline".to_string()
}

fn default_schedule() -> String {
    "@daily".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            schedule: default_schedule(),
            skip_extract: false,
            paths: PathsConfig::default(),
            extract: ExtractConfig::default(),
            transform: TransformOptions::default(),
            train: TrainOptions::default(),
            retry: RetryPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Where stages read and write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Raw CSV written by extract.
    #[serde(default = "default_raw_data")]
    pub raw_data: PathBuf,
    /// Serialized train/test bundle.
    #[serde(default = "default_bundle")]
    pub bundle: PathBuf,
    /// Fitted scaler; not written when absent.
    #[serde(default = "default_scaler")]
    pub scaler: Option<PathBuf>,
    /// Fitted model.
    #[serde(default = "default_model")]
    pub model: PathBuf,
    /// Best hyperparameters; not written when absent.
    #[serde(default = "default_params")]
    pub params: Option<PathBuf>,
    /// Metrics JSON.
    #[serde(default = "default_metrics")]
    pub metrics: PathBuf,
    /// Confusion matrix CSV, stored as the `plots` artifact.
    #[serde(default = "default_confusion_matrix")]
    pub confusion_matrix: PathBuf,
    /// Artifact store root.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

fn default_raw_data() -> PathBuf {
    PathBuf::from("data/raw/wdbc.csv")
}

fn default_bundle() -> PathBuf {
    PathBuf::from("data/processed/bundle.json")
}

#[allow(clippy::unnecessary_wraps)]
fn default_scaler() -> Option<PathBuf> {
    Some(PathBuf::from("data/processed/scaler.json"))
}

fn default_model() -> PathBuf {
    PathBuf::from("models/model.json")
}

#[allow(clippy::unnecessary_wraps)]
fn default_params() -> Option<PathBuf> {
    Some(PathBuf::from("models/best_params.json"))
}

fn default_metrics() -> PathBuf {
    PathBuf::from("reports/metrics.json")
}

fn default_confusion_matrix() -> PathBuf {
    PathBuf::from("reports/confusion_matrix.csv")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data: default_raw_data(),
            bundle: default_bundle(),
            scaler: default_scaler(),
            model: default_model(),
            params: default_params(),
            metrics: default_metrics(),
            confusion_matrix: default_confusion_matrix(),
            results_dir: default_results_dir(),
        }
    }
}

impl PathsConfig {
    /// Places every default path under `root`.
    #[must_use]
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let defaults = Self::default();
        Self {
            raw_data: root.join(defaults.raw_data),
            bundle: root.join(defaults.bundle),
            scaler: defaults.scaler.map(|p| root.join(p)),
            model: root.join(defaults.model),
            params: defaults.params.map(|p| root.join(p)),
            metrics: root.join(defaults.metrics),
            confusion_matrix: root.join(defaults.confusion_matrix),
            results_dir: root.join(defaults.results_dir),
        }
    }
}

/// Extract settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Dataset location: `http(s)://`, `file://` or a local path.
    #[serde(default)]
    pub source_url: Option<String>,
    /// Required columns of the raw dataset.
    #[serde(default)]
    pub schema: FeatureSchema,
}

impl PipelineConfig {
    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if the file cannot be read or parsed, or
    /// the error of [`PipelineConfig::validate`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON config.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for malformed JSON or an invalid
    /// value.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::invalid("<root>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses the schedule expression.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSchedule` for an unknown expression.
    pub fn schedule(&self) -> Result<Schedule, ConfigError> {
        self.schedule.parse()
    }

    /// Checks value ranges and cross-field requirements.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("name", "must not be empty"));
        }
        self.schedule()?;

        if !self.skip_extract
            && self
                .extract
                .source_url
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
        {
            return Err(ConfigError::invalid(
                "extract.source_url",
                "required unless skip_extract is set",
            ));
        }

        let fraction = self.transform.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ConfigError::invalid(
                "transform.test_fraction",
                format!("must be in (0, 1), got {fraction}"),
            ));
        }
        if self.transform.target.positive == self.transform.target.negative {
            return Err(ConfigError::invalid(
                "transform.target",
                "positive and negative labels must differ",
            ));
        }

        if self.train.cv_folds < 2 {
            return Err(ConfigError::invalid(
                "train.cv_folds",
                format!("must be at least 2, got {}", self.train.cv_folds),
            ));
        }
        if self.train.grid.is_empty() {
            return Err(ConfigError::invalid("train.grid", "must contain at least one candidate"));
        }
        if let Some(c) = self.train.grid.c_values.iter().find(|c| c.is_nan() || **c <= 0.0) {
            return Err(ConfigError::invalid(
                "train.grid.C",
                format!("values must be positive, got {c}"),
            ));
        }
        if self.train.max_iter == 0 {
            return Err(ConfigError::invalid("train.max_iter", "must be at least 1"));
        }

        self.retry.validate()?;
        self.logging.validate()
    }
}
