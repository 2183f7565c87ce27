//! # Training Data Loading and Validation
//!
//! The exclusive entry point for the labeled survey dataset. It reads a CSV
//! file, validates it against the fixed profile schema, and splits it into
//! respondent profiles and `target_`-prefixed label columns ready for the
//! training decomposer.
//!
//! - Strict schema: the fifteen feature column names are not configurable.
//! - User-centric errors: failures are assumed to be user-input errors and
//!   the `DataError` enum names the offending column.
//! - Target values are carried as strings so binary (0/1) and multi-valued
//!   categorical targets flow through one representation.

use crate::profile::{CATEGORICAL_COLUMNS, InputProfile, NUMERIC_COLUMNS};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Reserved prefix marking a column as a training target.
pub const TARGET_MARKER: &str = "target_";

const MINIMUM_ROWS: usize = 20;

/// One label column, with the reserved marker already stripped from its name.
#[derive(Debug, Clone)]
pub struct TargetColumn {
    /// Base name; becomes the ModelKey (or the `<base>__<value>` stem).
    pub name: String,
    /// One observed value per dataset row.
    pub values: Vec<String>,
}

/// The validated dataset: one profile per row plus every target column.
#[derive(Debug)]
pub struct TrainingDataset {
    pub profiles: Vec<InputProfile>,
    pub targets: Vec<TargetColumn>,
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("error from the underlying Polars DataFrame library: {0}")]
    Polars(#[from] PolarsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("the required column '{0}' was not found in the dataset; check spelling and case")]
    ColumnNotFound(String),
    #[error(
        "the column '{column_name}' could not be converted to the expected type '{expected_type}' (found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error("missing or null values were found in the required column '{0}'")]
    MissingValuesFound(String),
    #[error("the dataset contains only {found} rows, but at least {required} are required")]
    InsufficientRows { found: usize, required: usize },
    #[error("no 'target_'-prefixed target columns were found in the dataset")]
    NoTargetColumns,
}

/// Loads and validates the labeled dataset for training.
pub fn load_training_data(path: &Path) -> Result<TrainingDataset, DataError> {
    log::info!("Loading training data from '{}'", path.display());

    let df = CsvReader::new(File::open(path)?)
        .with_options(CsvReadOptions::default().with_has_header(true))
        .finish()?;

    if df.height() < MINIMUM_ROWS {
        return Err(DataError::InsufficientRows {
            found: df.height(),
            required: MINIMUM_ROWS,
        });
    }

    let column_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    let columns_set: HashSet<&str> = column_names.iter().map(String::as_str).collect();
    for column in NUMERIC_COLUMNS.iter().chain(CATEGORICAL_COLUMNS.iter()) {
        if !columns_set.contains(column) {
            return Err(DataError::ColumnNotFound((*column).to_string()));
        }
    }

    let target_names: Vec<&String> = column_names
        .iter()
        .filter(|name| name.starts_with(TARGET_MARKER))
        .collect();
    if target_names.is_empty() {
        return Err(DataError::NoTargetColumns);
    }

    let edad = extract_integer_column(&df, "edad")?;
    let estrato = extract_integer_column(&df, "estrato")?;
    let categorical: Vec<Vec<String>> = CATEGORICAL_COLUMNS
        .iter()
        .map(|column| extract_string_column(&df, column))
        .collect::<Result<_, _>>()?;

    let mut profiles = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        profiles.push(InputProfile {
            municipio: categorical[0][row].clone(),
            universidad: categorical[1][row].clone(),
            semestre: categorical[2][row].clone(),
            programa: categorical[3][row].clone(),
            rol: categorical[4][row].clone(),
            edad: edad[row],
            sexo: categorical[5][row].clone(),
            orientacion: categorical[6][row].clone(),
            identidad: categorical[7][row].clone(),
            discapacidad: categorical[8][row].clone(),
            etnia: categorical[9][row].clone(),
            religion: categorical[10][row].clone(),
            estado_civil: categorical[11][row].clone(),
            origen: categorical[12][row].clone(),
            estrato: estrato[row],
        });
    }

    let mut targets = Vec::with_capacity(target_names.len());
    for name in target_names {
        let values = extract_string_column(&df, name)?;
        targets.push(TargetColumn {
            name: name[TARGET_MARKER.len()..].to_string(),
            values,
        });
    }
    log::info!(
        "Detected {} target column(s): {:?}",
        targets.len(),
        targets.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
    );

    Ok(TrainingDataset { profiles, targets })
}

fn extract_integer_column(df: &DataFrame, column_name: &str) -> Result<Vec<i64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }
    let casted = match series.cast(&DataType::Int64) {
        Ok(casted) => casted,
        Err(_) => {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "i64 (integer)",
                found_type: format!("{:?}", series.dtype()),
            });
        }
    };
    if casted.null_count() > 0 {
        return Err(DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type: "i64 (integer)",
            found_type: format!("{:?}", series.dtype()),
        });
    }
    let chunked = casted.i64()?.rechunk();
    Ok(chunked.into_no_null_iter().collect())
}

fn extract_string_column(df: &DataFrame, column_name: &str) -> Result<Vec<String>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }
    let casted = match series.cast(&DataType::String) {
        Ok(casted) => casted,
        Err(_) => {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "string",
                found_type: format!("{:?}", series.dtype()),
            });
        }
    };
    let chunked = casted.str()?.rechunk();
    Ok(chunked.into_no_null_iter().map(str::to_string).collect())
}
