//! Headered CSV tables for tabular sample datasets

use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::{Error, Result};

/// A CSV file loaded as string cells with a header row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Create a table from headers and rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a row width differs from the header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != headers.len())
        {
            return Err(Error::InvalidInput(format!(
                "row {i} has {} cells, expected {}",
                row.len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    /// Read a headered CSV file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsed.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        Self::new(headers, rows)
    }

    /// Write the table to a CSV file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Column names.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the column does not exist.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::InvalidInput(format!("column '{name}' not found")))
    }

    /// All values of one column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the column does not exist.
    pub fn column(&self, name: &str) -> Result<Vec<String>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| row[idx].clone()).collect())
    }

    /// Split one column off: returns the remaining table and the column values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the column does not exist.
    pub fn split_column(&self, name: &str) -> Result<(Self, Vec<String>)> {
        let idx = self.column_index(name)?;
        let mut headers = self.headers.clone();
        headers.remove(idx);

        let mut values = Vec::with_capacity(self.rows.len());
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                values.push(row.remove(idx));
                row
            })
            .collect();

        Ok((Self { headers, rows }, values))
    }

    /// Numeric matrix (row-major) of the given columns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a column is missing or a cell is not a number.
    pub fn numeric_columns(&self, names: &[String]) -> Result<Vec<Vec<f64>>> {
        let indices = names
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<Vec<_>>>()?;

        self.rows
            .iter()
            .enumerate()
            .map(|(r, row)| {
                indices
                    .iter()
                    .map(|&c| {
                        row[c].parse::<f64>().map_err(|_| {
                            Error::InvalidInput(format!(
                                "row {r}, column '{}': '{}' is not a number",
                                self.headers[c], row[c]
                            ))
                        })
                    })
                    .collect()
            })
            .collect()
    }

    /// Shuffle rows with a fixed seed and split into `(train, test)`.
    ///
    /// `test_fraction` is clamped to `[0, 1]`; the test part gets
    /// `round(len * test_fraction)` rows.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn train_test_split(&self, test_fraction: f64, seed: u64) -> (Self, Self) {
        let mut rows = self.rows.clone();
        rows.shuffle(&mut StdRng::seed_from_u64(seed));

        let test_len = (rows.len() as f64 * test_fraction.clamp(0.0, 1.0)).round() as usize;
        let train_rows = rows.split_off(test_len);

        (
            Self {
                headers: self.headers.clone(),
                rows: train_rows,
            },
            Self {
                headers: self.headers.clone(),
                rows,
            },
        )
    }
}
