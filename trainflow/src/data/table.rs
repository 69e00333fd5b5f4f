//! In-memory CSV table.

use crate::errors::{InvalidDataError, IoError, PipelineError};
use std::path::Path;

/// A header row plus string cells, as read from CSV.
///
/// Cells stay as text until a transformation decides how to interpret each
/// column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table from headers and rows.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDataError::NotEnoughRows` if a row's width differs
    /// from the header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, PipelineError> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(InvalidDataError::NotEnoughRows(format!(
                "row {i} has {} cells, header has {}",
                row.len(),
                headers.len()
            ))
            .into());
        }
        Ok(Self { headers, rows })
    }

    /// Builds a table whose rows are known to match the header width.
    pub(crate) fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == headers.len()));
        Self { headers, rows }
    }

    /// Reads a CSV file with a header row.
    ///
    /// Blank header cells (a trailing comma on the header line) are named
    /// `Unnamed: <index>`.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be opened or parsed.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| IoError::new("opening CSV", path, e))?;

        let headers = reader
            .headers()
            .map_err(|e| IoError::new("reading CSV header of", path, e))?
            .iter()
            .enumerate()
            .map(|(i, h)| match h.trim() {
                "" => format!("Unnamed: {i}"),
                name => name.to_string(),
            })
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| IoError::new("reading CSV", path, e))?;
            rows.push(record.iter().map(|c| c.trim().to_string()).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Writes the table as CSV.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be written.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path).map_err(|e| IoError::new("creating CSV", path, e))?;
        writer
            .write_record(&self.headers)
            .map_err(|e| IoError::new("writing CSV", path, e))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|e| IoError::new("writing CSV", path, e))?;
        }
        writer.flush().map_err(|e| IoError::new("flushing CSV", path, e))?;
        Ok(())
    }

    /// Column names in file order.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Index of a column by exact name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Returns true if the column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterates over one column's cells.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[index].as_str())
    }

    /// Returns a copy without the named columns. Names that are absent are
    /// ignored.
    #[must_use]
    pub fn drop_columns(&self, names: &[String]) -> Self {
        let keep: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !names.contains(h))
            .map(|(i, _)| i)
            .collect();

        Self {
            headers: keep.iter().map(|&i| self.headers[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }
}
