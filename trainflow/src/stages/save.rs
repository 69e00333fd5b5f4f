//! Save stage: copy one artifact into the versioned store.

use super::Stage;
use crate::context::StageContext;
use crate::core::{ArtifactType, StageKind, StageOutput};
use crate::errors::{IoError, PipelineError};
use crate::store::ArtifactStore;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

/// Persists `source_path` as a new version of `artifact_type`.
#[derive(Debug, Clone)]
pub struct SaveStage {
    name: String,
    source_path: PathBuf,
    artifact_type: ArtifactType,
    store: Arc<ArtifactStore>,
}

impl SaveStage {
    /// Creates a save stage named `save_<type>`.
    #[must_use]
    pub fn new(source_path: impl Into<PathBuf>, artifact_type: ArtifactType, store: Arc<ArtifactStore>) -> Self {
        Self {
            name: format!("save_{artifact_type}"),
            source_path: source_path.into(),
            artifact_type,
            store,
        }
    }

    /// The artifact type this stage saves.
    #[must_use]
    pub fn artifact_type(&self) -> ArtifactType {
        self.artifact_type
    }
}

#[async_trait]
impl Stage for SaveStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Save
    }

    fn inputs(&self) -> Vec<PathBuf> {
        vec![self.source_path.clone()]
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        let store = Arc::clone(&self.store);
        let source = self.source_path.clone();
        let artifact_type = self.artifact_type;

        let saved = tokio::task::spawn_blocking(move || store.save(&source, artifact_type))
            .await
            .map_err(|e| PipelineError::from(IoError::new("saving", &self.source_path, e)))
            .and_then(|result| result);

        let record = saved.map_err(|e| {
            error!(stage = %self.name, path = %self.source_path.display(), error = %e, "Save failed");
            e
        })?;

        Ok(StageOutput::with_outputs([record.versioned_path.clone(), record.latest_path.clone()])
            .add_data("sha256", serde_json::json!(record.sha256))
            .add_artifact(record))
    }
}
