//! End-to-end turnover prediction
//!
//! split → fit → predict → evaluate → rank importances, with the whole run
//! memoized per dataset content and configuration.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::cache::{CacheStats, MemoCache, ModelKey};
use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::errors::Result;
use crate::forest::{FeatureImportance, ForestTrainer, ImportanceOrder, RandomForest};
use crate::metrics::{evaluate, ClassificationReport};
use crate::split::stratified_split;

/// Partition sizes of a stratified split
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SplitSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_positives: usize,
    pub test_positives: usize,
}

/// Everything one pipeline run produces
#[derive(Clone, Debug)]
pub struct PipelineRun {
    pub split: SplitSummary,
    pub model: RandomForest,
    pub test_labels: Vec<bool>,
    pub predictions: Vec<bool>,
    pub evaluation: ClassificationReport,
    /// Ascending by score, the order the report draws them in
    pub importances: Vec<FeatureImportance>,
}

/// Run the pipeline once without caching
pub fn run_pipeline(dataset: &Dataset, config: &PipelineConfig) -> Result<PipelineRun> {
    config.validate()?;

    let samples = dataset.samples(&config.data.features, &config.data.label)?;
    let split = stratified_split(&samples, &config.split)?;
    info!(
        train = split.train.len(),
        test = split.test.len(),
        seed = config.split.seed,
        "dataset split"
    );

    let model = ForestTrainer::new(config.forest.clone()).fit(&split.train)?;
    let predictions = model.predict_samples(&split.test)?;
    let evaluation = evaluate(split.test.labels(), &predictions)?;
    let importances = model.ranked_importances(ImportanceOrder::Ascending);

    info!(
        accuracy = evaluation.accuracy,
        left_recall = ?evaluation.class(true).recall,
        "model evaluated"
    );

    Ok(PipelineRun {
        split: SplitSummary {
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            train_positives: split.train.positive_count(),
            test_positives: split.test.positive_count(),
        },
        model,
        test_labels: split.test.labels().to_vec(),
        predictions,
        evaluation,
        importances,
    })
}

/// Pipeline bound to one configuration, memoizing runs per dataset
pub struct TurnoverPipeline {
    config: PipelineConfig,
    runs: MemoCache<ModelKey, PipelineRun>,
}

impl TurnoverPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            runs: MemoCache::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn key(&self, dataset: &Dataset) -> Result<ModelKey> {
        ModelKey::new(
            dataset.fingerprint(),
            &self.config.data.features,
            &self.config.data.label,
            &self.config.split,
            &self.config.forest,
        )
    }

    /// Run (or reuse) the pipeline for this dataset
    pub fn run(&mut self, dataset: &Dataset) -> Result<Arc<PipelineRun>> {
        let key = self.key(dataset)?;
        let config = &self.config;
        self.runs
            .get_or_try_insert_with(key, || run_pipeline(dataset, config))
    }

    /// Drop the memoized run for this dataset
    pub fn invalidate(&mut self, dataset: &Dataset) -> Result<bool> {
        let key = self.key(dataset)?;
        Ok(self.runs.invalidate(&key))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.runs.stats()
    }
}
