//! Tabular dataset loading and feature/label projection
//!
//! Reads a delimited file with a header row into an immutable, column-major
//! table. Columns whose every cell parses as a finite number are numeric;
//! everything else is kept as categorical text so schema errors can point
//! at the offending cell.

use serde::Serialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use crate::errors::{PipelineError, Result};

/// Binary label column: 1 when the employee left the company
pub const LABEL_COLUMN: &str = "left_company";

/// Features with the strongest signal for turnover, in model column order
pub const HIGH_SIGNAL_FEATURES: [&str; 8] = [
    "burnout_risk",
    "stress_level",
    "satisfaction_score",
    "email_sentiment",
    "workload_score",
    "project_completion_rate",
    "collaboration_score",
    "meeting_participation",
];

/// Every numeric field of the employee schema
pub const EMPLOYEE_FIELDS: [&str; 9] = [
    "satisfaction_score",
    "stress_level",
    "burnout_risk",
    "workload_score",
    "performance_score",
    "email_sentiment",
    "project_completion_rate",
    "collaboration_score",
    "meeting_participation",
];

/// A single typed column
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Column {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Categorical(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> &'static str {
        match self {
            Column::Numeric(_) => "numeric",
            Column::Categorical(_) => "categorical",
        }
    }

    fn infer(cells: Vec<String>) -> Self {
        let parsed: Option<Vec<f64>> = cells
            .iter()
            .map(|cell| cell.parse::<f64>().ok().filter(|v| v.is_finite()))
            .collect();

        match parsed {
            Some(values) => Column::Numeric(values),
            None => Column::Categorical(cells),
        }
    }
}

/// Immutable in-memory table
#[derive(Clone, Debug)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Column>,
    rows: usize,
    fingerprint: String,
}

impl Dataset {
    /// Load a dataset from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|err| {
            PipelineError::Io(std::io::Error::new(
                err.kind(),
                format!("failed to open {}: {err}", path.display()),
            ))
        })?;
        Self::from_reader(file)
    }

    /// Load a dataset from any CSV source with a header row
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let fingerprint = hex::encode(blake3::hash(&bytes).as_bytes());

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(bytes.as_slice());

        let names: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|name| name.to_string())
            .collect();
        check_unique_names(&names)?;

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        for record in csv_reader.records() {
            let record = record?;
            for (column, value) in cells.iter_mut().zip(record.iter()) {
                column.push(value.to_string());
            }
        }

        let columns = cells.into_iter().map(Column::infer).collect();
        let mut dataset = Self::assemble(names, columns)?;
        dataset.fingerprint = fingerprint;
        Ok(dataset)
    }

    /// Build a dataset from named columns of equal length
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Column)>) -> Result<Self> {
        let (names, columns): (Vec<String>, Vec<Column>) = columns
            .into_iter()
            .map(|(name, column)| (name.into(), column))
            .unzip();
        check_unique_names(&names)?;
        Self::assemble(names, columns)
    }

    fn assemble(names: Vec<String>, columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        if let Some((name, column)) = names
            .iter()
            .zip(columns.iter())
            .find(|(_, column)| column.len() != rows)
        {
            return Err(PipelineError::Schema(format!(
                "column '{name}' has {} rows, expected {rows}",
                column.len()
            )));
        }

        if rows == 0 {
            return Err(PipelineError::InsufficientData(
                "dataset has no rows".to_string(),
            ));
        }

        let fingerprint = fingerprint_columns(&names, &columns);
        Ok(Self {
            names,
            columns,
            rows,
            fingerprint,
        })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// BLAKE3 hex digest identifying the dataset content
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .map(|idx| &self.columns[idx])
    }

    /// Borrow a required numeric column
    pub fn numeric_column(&self, name: &str) -> Result<&[f64]> {
        match self.column(name) {
            Some(Column::Numeric(values)) => Ok(values),
            Some(Column::Categorical(cells)) => {
                let (row, cell) = cells
                    .iter()
                    .enumerate()
                    .find(|(_, cell)| cell.parse::<f64>().map_or(true, |v| !v.is_finite()))
                    .map(|(row, cell)| (row, cell.as_str()))
                    .unwrap_or((0, ""));
                Err(PipelineError::Schema(format!(
                    "column '{name}' must be numeric, row {} has '{cell}'",
                    row + 1
                )))
            }
            None => Err(PipelineError::Schema(format!(
                "missing required column '{name}'"
            ))),
        }
    }

    /// Decode a binary label column (0/1 or true/false)
    pub fn label_column(&self, name: &str) -> Result<Vec<bool>> {
        let column = self.column(name).ok_or_else(|| {
            PipelineError::Schema(format!("missing required label column '{name}'"))
        })?;

        match column {
            Column::Numeric(values) => values
                .iter()
                .enumerate()
                .map(|(row, &value)| {
                    if value == 0.0 {
                        Ok(false)
                    } else if value == 1.0 {
                        Ok(true)
                    } else {
                        Err(PipelineError::Schema(format!(
                            "label '{name}' must be binary, row {} has {value}",
                            row + 1
                        )))
                    }
                })
                .collect(),
            Column::Categorical(cells) => cells
                .iter()
                .enumerate()
                .map(|(row, cell)| match cell.to_ascii_lowercase().as_str() {
                    "true" | "yes" => Ok(true),
                    "false" | "no" => Ok(false),
                    _ => Err(PipelineError::Schema(format!(
                        "label '{name}' must be binary, row {} has '{cell}'",
                        row + 1
                    ))),
                })
                .collect(),
        }
    }

    /// Project the dataset onto an ordered feature list and a label
    pub fn samples<S: AsRef<str>>(&self, features: &[S], label: &str) -> Result<Samples> {
        if features.is_empty() {
            return Err(PipelineError::Schema("feature list is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for feature in features {
            let feature = feature.as_ref();
            if !seen.insert(feature) {
                return Err(PipelineError::Schema(format!(
                    "feature '{feature}' listed more than once"
                )));
            }
            if feature == label {
                return Err(PipelineError::Schema(format!(
                    "label '{label}' cannot also be a feature"
                )));
            }
        }

        let columns = features
            .iter()
            .map(|feature| self.numeric_column(feature.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let labels = self.label_column(label)?;

        let rows = (0..self.rows)
            .map(|row| columns.iter().map(|column| column[row]).collect())
            .collect();
        let feature_names = features.iter().map(|f| f.as_ref().to_string()).collect();

        Samples::new(feature_names, rows, labels)
    }

    /// Describe the schema for logging
    pub fn schema_summary(&self) -> Vec<(String, &'static str)> {
        self.names
            .iter()
            .zip(self.columns.iter())
            .map(|(name, column)| (name.clone(), column.kind()))
            .collect()
    }
}

fn check_unique_names(names: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(PipelineError::Schema(format!("duplicate column '{name}'")));
        }
    }
    Ok(())
}

fn fingerprint_columns(names: &[String], columns: &[Column]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (name, column) in names.iter().zip(columns.iter()) {
        hasher.update(&(name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        match column {
            Column::Numeric(values) => {
                hasher.update(b"n");
                for value in values {
                    hasher.update(&value.to_le_bytes());
                }
            }
            Column::Categorical(cells) => {
                hasher.update(b"c");
                for cell in cells {
                    hasher.update(&(cell.len() as u64).to_le_bytes());
                    hasher.update(cell.as_bytes());
                }
            }
        }
    }
    hex::encode(hasher.finalize().as_bytes())
}

/// Row-aligned feature matrix and label vector
#[derive(Clone, Debug, PartialEq)]
pub struct Samples {
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
    labels: Vec<bool>,
}

impl Samples {
    /// Build samples, rejecting misaligned rows
    pub fn new(
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        labels: Vec<bool>,
    ) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(PipelineError::Schema(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }

        if let Some((row, width)) = features
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, width)| *width != feature_names.len())
        {
            return Err(PipelineError::Schema(format!(
                "row {row} has {width} features, expected {}",
                feature_names.len()
            )));
        }

        Ok(Self {
            feature_names,
            features,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    pub fn labels(&self) -> &[bool] {
        &self.labels
    }

    /// Number of rows labelled positive (left the company)
    pub fn positive_count(&self) -> usize {
        self.labels.iter().filter(|&&label| label).count()
    }

    /// Copy the given rows, in the given order
    pub fn select(&self, indices: &[usize]) -> Samples {
        Samples {
            feature_names: self.feature_names.clone(),
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}
