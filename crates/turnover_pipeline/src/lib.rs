//! Turnover Pipeline - deterministic employee turnover prediction
//!
//! Loads a labeled employee table, splits it with stratified sampling,
//! fits a class-balanced random forest, and derives evaluation metrics and
//! feature importances. Every random draw is seeded, so a given dataset and
//! configuration always produce the same model.
//!
//! Modules:
//! - `dataset`: CSV loading and feature/label projection
//! - `split`: stratified train/test partitioning
//! - `forest`: CART trees, bagging, class balancing, importances
//! - `metrics`: confusion matrix and per-class precision/recall/F1
//! - `stats`: descriptive statistics for exploratory summaries
//! - `cache`: explicit memoization of datasets and pipeline runs
//! - `config`: TOML configuration

pub mod cache;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod forest;
pub mod metrics;
pub mod pipeline;
pub mod split;
pub mod stats;

pub use cache::{CacheStats, DatasetCache, MemoCache, ModelKey};
pub use config::{DataConfig, PipelineConfig};
pub use dataset::{Column, Dataset, Samples, EMPLOYEE_FIELDS, HIGH_SIGNAL_FEATURES, LABEL_COLUMN};
pub use errors::{PipelineError, Result};
pub use forest::{
    fit, ClassWeight, FeatureImportance, ForestConfig, ForestTrainer, ImportanceOrder,
    MaxFeatures, ModelMetadata, RandomForest,
};
pub use metrics::{evaluate, ClassMetrics, ClassificationReport, ConfusionMatrix};
pub use pipeline::{run_pipeline, PipelineRun, SplitSummary, TurnoverPipeline};
pub use split::{split, stratified_split, SplitConfig, TrainTestSplit};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
