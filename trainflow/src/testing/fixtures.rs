//! Synthetic datasets shaped like the raw diagnostic table.

use crate::data::{FeatureSchema, Table};
use crate::errors::PipelineError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Builds a raw table with every column of `schema`, `positives` malignant
/// rows followed by benign ones, and a trailing blank column.
///
/// Malignant rows have larger feature values, so the classes are separable
/// but noisy. The same `seed` always yields the same table.
#[must_use]
pub fn synthetic_table(schema: &FeatureSchema, rows: usize, positives: usize, seed: u64) -> Table {
    let features = schema.feature_columns();
    let mut headers = vec![schema.id_column.clone(), schema.target_column.clone()];
    headers.extend(features.iter().cloned());
    headers.push(String::new());

    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..rows)
        .map(|i| {
            let malignant = i < positives;
            let mut row = vec![
                (84_300 + i).to_string(),
                if malignant { "M" } else { "B" }.to_string(),
            ];
            for j in 0..features.len() {
                #[allow(clippy::cast_precision_loss)]
                let base = 1.0 + j as f64;
                let shift = if malignant { 0.8 * base } else { 0.0 };
                let noise: f64 = rng.gen_range(-0.3..0.3) * base;
                row.push(format!("{:.4}", base + shift + noise));
            }
            row.push(String::new());
            row
        })
        .collect();

    Table::from_parts(headers, data)
}

/// Writes [`synthetic_table`] with the default schema to `path`.
///
/// # Errors
///
/// Returns `IoError` if the file cannot be written.
pub fn write_synthetic_csv(
    path: impl AsRef<Path>,
    rows: usize,
    positives: usize,
    seed: u64,
) -> Result<Table, PipelineError> {
    let path = path.as_ref();
    crate::data::ensure_parent(path)?;
    let table = synthetic_table(&FeatureSchema::default(), rows, positives, seed);
    table.write_csv(path)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_synthetic_table_satisfies_schema() {
        let schema = FeatureSchema::default();
        let table = synthetic_table(&schema, 10, 2, 1);

        assert_eq!(table.row_count(), 10);
        assert_eq!(table.column_count(), 33);
        assert!(schema.validate(&table).is_ok());
    }

    #[test]
    fn test_written_csv_names_trailing_column() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("raw").join("wdbc.csv");
        write_synthetic_csv(&path, 5, 1, 3).unwrap();

        let loaded = Table::read_csv(&path).unwrap();
        assert_eq!(loaded.headers()[32], "Unnamed: 32");
        assert_eq!(loaded.rows()[0][1], "M");
    }
}
