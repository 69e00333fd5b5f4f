//! Artifact types and the record produced by every versioned save.

use crate::errors::InvalidSourceError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The closed set of artifact types the store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    /// A fitted model.
    Model,
    /// Evaluation metrics.
    Metrics,
    /// Report tables and plots (the confusion matrix).
    Plots,
}

impl ArtifactType {
    /// All artifact types in save order.
    pub const ALL: [Self; 3] = [Self::Model, Self::Metrics, Self::Plots];

    /// The lowercase tag used in directory and file names.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Metrics => "metrics",
            Self::Plots => "plots",
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = InvalidSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "model" => Ok(Self::Model),
            "metrics" => Ok(Self::Metrics),
            "plots" => Ok(Self::Plots),
            _ => Err(InvalidSourceError::UnknownArtifactType { tag: s.to_string() }),
        }
    }
}

/// One versioned save.
///
/// Records are immutable; a later save of the same type supersedes the
/// latest copy but never touches this record's versioned copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Logical name of the artifact.
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,

    /// Local wall-clock time of the save, second resolution.
    pub timestamp: NaiveDateTime,

    /// File extension including the leading dot, or empty.
    pub extension: String,

    /// The timestamped copy.
    pub versioned_path: PathBuf,

    /// The fixed-name latest copy.
    pub latest_path: PathBuf,

    /// Size of the copied content in bytes.
    pub size_bytes: u64,

    /// Hex-encoded SHA-256 of the content.
    pub sha256: String,
}

impl ArtifactRecord {
    /// The timestamp rendered the way it appears in file names.
    #[must_use]
    pub fn timestamp_tag(&self) -> String {
        self.timestamp.format(crate::store::TIMESTAMP_FORMAT).to_string()
    }
}
