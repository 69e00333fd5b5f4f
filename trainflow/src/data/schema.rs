//! Required-column schema for the raw dataset.

use super::Table;
use crate::errors::SchemaValidationError;
use serde::{Deserialize, Serialize};

/// Columns the raw dataset must carry.
///
/// Feature columns are named `<feature>_<statistic>` for every base feature
/// crossed with every statistic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Identifier column.
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Categorical target column.
    #[serde(default = "default_target_column")]
    pub target_column: String,
    /// Base measurement names.
    #[serde(default = "default_base_features")]
    pub base_features: Vec<String>,
    /// Statistic suffixes (mean, standard error, worst).
    #[serde(default = "default_statistics")]
    pub statistics: Vec<String>,
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_target_column() -> String {
    "diagnosis".to_string()
}

fn default_base_features() -> Vec<String> {
    [
        "radius",
        "texture",
        "perimeter",
        "area",
        "smoothness",
        "compactness",
        "concavity",
        "concave points",
        "symmetry",
        "fractal_dimension",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_statistics() -> Vec<String> {
    ["mean", "se", "worst"].into_iter().map(String::from).collect()
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            id_column: default_id_column(),
            target_column: default_target_column(),
            base_features: default_base_features(),
            statistics: default_statistics(),
        }
    }
}

impl FeatureSchema {
    /// Creates a schema from its parts.
    #[must_use]
    pub fn new(
        id_column: impl Into<String>,
        target_column: impl Into<String>,
        base_features: Vec<String>,
        statistics: Vec<String>,
    ) -> Self {
        Self {
            id_column: id_column.into(),
            target_column: target_column.into(),
            base_features,
            statistics,
        }
    }

    /// Feature column names, grouped by statistic then base feature.
    #[must_use]
    pub fn feature_columns(&self) -> Vec<String> {
        self.statistics
            .iter()
            .flat_map(|stat| {
                self.base_features
                    .iter()
                    .map(move |feature| format!("{feature}_{stat}"))
            })
            .collect()
    }

    /// Every required column: id, target, then features.
    #[must_use]
    pub fn required_columns(&self) -> Vec<String> {
        let mut columns = vec![self.id_column.clone(), self.target_column.clone()];
        columns.extend(self.feature_columns());
        columns
    }

    /// Checks that `table` carries every required column.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError` listing every missing column.
    pub fn validate(&self, table: &Table) -> Result<(), SchemaValidationError> {
        let missing: Vec<String> = self
            .required_columns()
            .into_iter()
            .filter(|column| !table.has_column(column))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaValidationError::new(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_schema() -> FeatureSchema {
        FeatureSchema::new(
            "id",
            "diagnosis",
            vec!["radius".to_string(), "area".to_string()],
            vec!["mean".to_string(), "se".to_string(), "worst".to_string()],
        )
    }

    fn table_with(headers: &[String]) -> Table {
        Table::new(headers.to_vec(), vec![vec!["0".to_string(); headers.len()]]).unwrap()
    }

    #[test]
    fn test_default_schema_has_thirty_features() {
        let schema = FeatureSchema::default();
        assert_eq!(schema.feature_columns().len(), 30);
        assert_eq!(schema.required_columns().len(), 32);
        assert!(schema.feature_columns().contains(&"concave points_worst".to_string()));
    }

    #[test]
    fn test_feature_column_order() {
        let columns = small_schema().feature_columns();
        assert_eq!(
            columns,
            vec![
                "radius_mean",
                "area_mean",
                "radius_se",
                "area_se",
                "radius_worst",
                "area_worst"
            ]
        );
    }

    #[test]
    fn test_validate_accepts_superset() {
        let schema = small_schema();
        let mut headers = schema.required_columns();
        headers.push("Unnamed: 32".to_string());

        assert!(schema.validate(&table_with(&headers)).is_ok());
    }

    #[test]
    fn test_validate_reports_all_missing() {
        let schema = small_schema();
        let headers: Vec<String> = schema
            .required_columns()
            .into_iter()
            .filter(|c| c != "id" && c != "area_se")
            .collect();

        let err = schema.validate(&table_with(&headers)).unwrap_err();
        assert_eq!(err.missing, vec!["id".to_string(), "area_se".to_string()]);
    }
}
