//! Stage output type.

use super::ArtifactRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// What a successful stage execution produced.
///
/// The durable handoff between stages happens through the files listed in
/// `outputs`; `data` only carries a small summary for logs and run records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// Files written by the stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<PathBuf>,

    /// Summary values (row counts, chosen hyperparameters, metrics).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,

    /// Versioned artifacts recorded by the stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactRecord>,
}

impl StageOutput {
    /// Creates an output with nothing in it.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates an output listing the written files.
    #[must_use]
    pub fn with_outputs(outputs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            outputs: outputs.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Adds a written file.
    #[must_use]
    pub fn add_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    /// Adds a summary value.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Adds an artifact record.
    #[must_use]
    pub fn add_artifact(mut self, record: ArtifactRecord) -> Self {
        self.artifacts.push(record);
        self
    }

    /// Gets a summary value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_builder_chaining() {
        let output = StageOutput::with_outputs([PathBuf::from("a.json")])
            .add_output("b.json")
            .add_data("rows", serde_json::json!(10));

        assert_eq!(output.outputs.len(), 2);
        assert_eq!(output.get("rows"), Some(&serde_json::json!(10)));
        assert!(output.artifacts.is_empty());
    }

    #[test]
    fn test_empty_output_serializes_compactly() {
        let json = serde_json::to_string(&StageOutput::empty()).unwrap();
        assert_eq!(json, "{}");
    }
}
