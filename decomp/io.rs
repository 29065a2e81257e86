//! Loading covariance matrices from delimited text and writing decomposition results.
//!
//! Matrices are headerless: one row per line, tab separated for `.tsv`/`.txt`
//! files and comma separated otherwise. Lines starting with `#` are skipped.

use crate::eigen::SolverBranch;
use crate::model::Decomposition;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to read or write file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse delimited file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to serialize summary to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Could not parse '{value}' at row {row}, column {column} as a number.")]
    InvalidNumber {
        row: usize,
        column: usize,
        value: String,
    },

    #[error("Row {row} has {found} columns, but the first row has {expected}.")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("The file '{0}' contains no data rows.")]
    Empty(String),
}

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("txt") => b'\t',
        _ => b',',
    }
}

/// Reads a real matrix from a headerless delimited file.
pub fn load_matrix(path: impl AsRef<Path>) -> Result<Array2<f64>, DataError> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter_for(path))
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut values = Vec::new();
    let mut ncols = None;
    let mut nrows = 0;
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let expected = *ncols.get_or_insert(record.len());
        if record.len() != expected {
            return Err(DataError::RaggedRow {
                row: row + 1,
                found: record.len(),
                expected,
            });
        }
        for (column, field) in record.iter().enumerate() {
            let value = field.parse::<f64>().map_err(|_| DataError::InvalidNumber {
                row: row + 1,
                column: column + 1,
                value: field.to_string(),
            })?;
            values.push(value);
        }
        nrows += 1;
    }

    let Some(ncols) = ncols else {
        return Err(DataError::Empty(path.display().to_string()));
    };
    log::debug!("Loaded {}x{} matrix from {}", nrows, ncols, path.display());
    Array2::from_shape_vec((nrows, ncols), values)
        .map_err(|e| DataError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Writes a real matrix as a headerless TSV file.
pub fn write_matrix(path: impl AsRef<Path>, matrix: &Array2<f64>) -> Result<(), DataError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_path(path.as_ref())?;
    for row in matrix.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// A human-readable record of one decomposition, written next to the matrices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionSummary {
    pub method: String,
    pub condition_number: f64,
    pub x_variables: usize,
    pub y_variables: usize,
    pub requested_components: usize,
    pub components: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retained: Option<[usize; 2]>,
    /// Real parts of `D`.
    pub strengths: Vec<f64>,
    /// Largest imaginary magnitude dropped when writing real-valued output.
    pub max_imaginary: f64,
    pub solver: SolverBranch,
}

impl From<&Decomposition> for DecompositionSummary {
    fn from(result: &Decomposition) -> Self {
        Self {
            method: result.method.to_string(),
            condition_number: result.condition_number,
            x_variables: result.nx,
            y_variables: result.ny,
            requested_components: result.requested_components,
            components: result.n_components(),
            retained: result.retained,
            strengths: result.real_strengths().to_vec(),
            max_imaginary: result.max_imaginary(),
            solver: result.solver,
        }
    }
}

impl DecompositionSummary {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path.as_ref())?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }
}
