//! Error types for the turnover pipeline

use thiserror::Error;

/// Errors returned by the turnover pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required field is missing, mistyped, or misaligned
    #[error("schema error: {0}")]
    Schema(String),

    /// Too few rows to split, stratify, or fit
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A metric has a zero denominator and cannot be reported
    #[error("degenerate metric: {0}")]
    DegenerateMetric(String),

    /// Hyperparameters or split settings are out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
