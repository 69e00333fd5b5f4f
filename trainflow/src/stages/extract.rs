//! Extract stage: fetch the raw CSV and validate its columns.

use super::Stage;
use crate::context::StageContext;
use crate::core::{StageKind, StageOutput};
use crate::data::{ensure_parent, FeatureSchema, Table};
use crate::errors::{IoError, PipelineError};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Retrieves a source document into a local file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Writes the content of `source` to `destination` and returns the
    /// number of bytes written.
    async fn fetch(&self, source: &str, destination: &Path) -> Result<u64, PipelineError>;
}

/// Fetches `http(s)://` URLs over HTTP and `file://` URLs or plain paths
/// from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct SourceFetcher {
    #[cfg(feature = "http")]
    client: reqwest::Client,
}

impl SourceFetcher {
    /// Creates a fetcher with a default HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(feature = "http")]
    async fn fetch_http(&self, url: &str, destination: &Path) -> Result<u64, PipelineError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| IoError::new("downloading", url, e))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| IoError::new("downloading", url, e))?;
        tokio::fs::write(destination, &body)
            .await
            .map_err(|e| IoError::new("writing", destination, e))?;
        Ok(body.len() as u64)
    }

    #[cfg(not(feature = "http"))]
    #[allow(clippy::unused_async)]
    async fn fetch_http(&self, url: &str, _destination: &Path) -> Result<u64, PipelineError> {
        Err(IoError::new("downloading", url, "built without the `http` feature").into())
    }

    async fn fetch_local(source: &Path, destination: &Path) -> Result<u64, PipelineError> {
        let same_file = match (source.canonicalize(), destination.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same_file {
            let meta = tokio::fs::metadata(source)
                .await
                .map_err(|e| IoError::new("reading", source, e))?;
            return Ok(meta.len());
        }
        tokio::fs::copy(source, destination)
            .await
            .map_err(|e| IoError::new("copying", source, e).into())
    }
}

#[async_trait]
impl Fetcher for SourceFetcher {
    async fn fetch(&self, source: &str, destination: &Path) -> Result<u64, PipelineError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            self.fetch_http(source, destination).await
        } else {
            let path = source.strip_prefix("file://").unwrap_or(source);
            Self::fetch_local(Path::new(path), destination).await
        }
    }
}

/// Downloads the raw dataset and checks that every required column exists.
pub struct ExtractStage {
    name: String,
    source: String,
    output_path: PathBuf,
    schema: FeatureSchema,
    fetcher: Arc<dyn Fetcher>,
}

impl ExtractStage {
    /// Creates an extract stage with the default schema and fetcher.
    #[must_use]
    pub fn new(source: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            name: "extract".to_string(),
            source: source.into(),
            output_path: output_path.into(),
            schema: FeatureSchema::default(),
            fetcher: Arc::new(SourceFetcher::new()),
        }
    }

    /// Sets the required-column schema.
    #[must_use]
    pub fn with_schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Replaces the fetcher.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Where the raw file is written.
    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Fetches the source, loads it and validates the schema.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if fetching or parsing fails and
    /// `SchemaValidationError` listing every missing column.
    pub async fn extract(&self) -> Result<Table, PipelineError> {
        ensure_parent(&self.output_path)?;
        let bytes = self.fetcher.fetch(&self.source, &self.output_path).await?;
        info!(
            stage = %self.name,
            source = %self.source,
            path = %self.output_path.display(),
            bytes,
            "Fetched raw dataset"
        );

        let table = Table::read_csv(&self.output_path)?;
        self.schema.validate(&table)?;
        Ok(table)
    }
}

impl fmt::Debug for ExtractStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractStage")
            .field("source", &self.source)
            .field("output_path", &self.output_path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for ExtractStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Extract
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.output_path.clone()]
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        let table = self.extract().await.map_err(|e| {
            error!(stage = %self.name, path = %self.output_path.display(), error = %e, "Extraction failed");
            e
        })?;

        Ok(StageOutput::with_outputs([self.output_path.clone()])
            .add_data("rows", serde_json::json!(table.row_count()))
            .add_data("columns", serde_json::json!(table.column_count())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SchemaValidationError;
    use mockall::predicate::eq;
    use tempfile::TempDir;

    fn small_schema() -> FeatureSchema {
        FeatureSchema::new("id", "diagnosis", vec!["radius".into()], vec!["mean".into()])
    }

    const CSV: &str = "id,diagnosis,radius_mean,\n1,M,17.99,\n2,B,11.42,\n3,B,12.1,\n";

    #[tokio::test]
    async fn test_extract_local_path_keeps_rows() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.csv");
        std::fs::write(&source, CSV).unwrap();
        let output = tmp.path().join("raw").join("data.csv");

        let stage = ExtractStage::new(source.to_string_lossy(), &output).with_schema(small_schema());
        let table = stage.extract().await.unwrap();

        assert_eq!(table.row_count(), 3);
        assert!(output.exists());

        let out = stage.execute(&StageContext::standalone("extract")).await.unwrap();
        assert_eq!(out.get("rows"), Some(&serde_json::json!(3)));
        assert_eq!(out.outputs, vec![output]);
    }

    #[tokio::test]
    async fn test_extract_file_url() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.csv");
        std::fs::write(&source, CSV).unwrap();
        let output = tmp.path().join("data.csv");

        let stage = ExtractStage::new(format!("file://{}", source.display()), &output)
            .with_schema(small_schema());
        assert_eq!(stage.extract().await.unwrap().row_count(), 3);
    }

    #[tokio::test]
    async fn test_extract_in_place_does_not_truncate() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.csv");
        std::fs::write(&path, CSV).unwrap();

        let stage = ExtractStage::new(path.to_string_lossy(), &path).with_schema(small_schema());
        assert_eq!(stage.extract().await.unwrap().row_count(), 3);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), CSV);
    }

    #[tokio::test]
    async fn test_missing_columns_reported() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("data.csv");

        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .with(eq("https://example.org/wdbc.csv"), eq(output.clone()))
            .times(1)
            .returning(|_, dest| {
                std::fs::write(dest, "id,radius_mean\n1,17.99\n").unwrap();
                Ok(24)
            });

        let stage = ExtractStage::new("https://example.org/wdbc.csv", &output)
            .with_schema(small_schema())
            .with_fetcher(Arc::new(fetcher));

        let err = stage.execute(&StageContext::standalone("extract")).await.unwrap_err();
        match err {
            PipelineError::SchemaValidation(SchemaValidationError { missing }) => {
                assert_eq!(missing, vec!["diagnosis".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let tmp = TempDir::new().unwrap();
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|source, _| Err(IoError::new("downloading", source, "connection refused").into()));

        let stage = ExtractStage::new("https://example.org/wdbc.csv", tmp.path().join("d.csv"))
            .with_fetcher(Arc::new(fetcher));

        let err = stage.extract().await.unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[tokio::test]
    async fn test_missing_local_source_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let stage = ExtractStage::new("/no/such/file.csv", tmp.path().join("d.csv"));
        assert_eq!(stage.extract().await.unwrap_err().kind(), "io");
    }
}
