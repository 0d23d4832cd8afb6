//! Random forest classifier
//!
//! Bagged CART trees with per-tree class rebalancing. A fitted
//! [`RandomForest`] is an immutable value: it answers predictions and
//! feature importances and nothing else.

mod cart;
mod tree;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::dataset::Samples;
use crate::deterministic::{derive_seed, seeded_rng};
use crate::errors::{PipelineError, Result};

use cart::{CartBuilder, TreeConfig};
use tree::Tree;

/// Class-balancing strategy applied to each tree's training rows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every row weighs 1
    None,
    /// Weights from class frequencies of the whole training partition
    Balanced,
    /// Weights recomputed from each tree's bootstrap resample
    BalancedSubsample,
}

impl fmt::Display for ClassWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClassWeight::None => "none",
            ClassWeight::Balanced => "balanced",
            ClassWeight::BalancedSubsample => "balanced_subsample",
        };
        f.write_str(name)
    }
}

impl FromStr for ClassWeight {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(ClassWeight::None),
            "balanced" => Ok(ClassWeight::Balanced),
            "balanced_subsample" => Ok(ClassWeight::BalancedSubsample),
            other => Err(format!(
                "unknown class weight '{other}' (expected none, balanced, balanced_subsample)"
            )),
        }
    }
}

/// Strategy for features inspected per split
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Square root of the feature count
    Sqrt,
    /// Log2 of the feature count
    Log2,
    /// Every feature
    All,
    /// Fixed number of features
    Count(usize),
    /// Fraction of the feature count
    Fraction(f64),
}

impl MaxFeatures {
    /// Resolve to a concrete count in `1..=n_features`
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let count = match *self {
            MaxFeatures::Sqrt => n.sqrt().floor() as usize,
            MaxFeatures::Log2 => n.log2().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(count) => count,
            MaxFeatures::Fraction(fraction) => (fraction * n).floor() as usize,
        };
        count.clamp(1, n_features.max(1))
    }
}

/// Forest hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub class_weight: ClassWeight,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 6,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            class_weight: ClassWeight::BalancedSubsample,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        match self.max_features {
            MaxFeatures::Count(0) => Err(PipelineError::InvalidConfig(
                "max_features count must be at least 1".to_string(),
            )),
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => Err(PipelineError::InvalidConfig(
                format!("max_features fraction must be in (0, 1], got {f}"),
            )),
            _ => Ok(()),
        }
    }
}

/// One feature's share of the forest's impurity reduction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub score: f64,
}

/// Presentation order for ranked importances
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportanceOrder {
    Ascending,
    Descending,
}

/// Summary of how a forest was trained
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub class_weight: ClassWeight,
    pub seed: u64,
    pub training_rows: usize,
    pub training_positives: usize,
    pub mean_tree_depth: f64,
    pub total_nodes: usize,
    /// BLAKE3 hex digest of the serialized trees
    pub model_hash: String,
}

/// Fitted random forest classifier
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    feature_names: Vec<String>,
    trees: Vec<Tree>,
    importances: Vec<f64>,
    metadata: ModelMetadata,
}

impl RandomForest {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean positive-class probability across trees for each row
    pub fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter()
            .enumerate()
            .map(|(row_idx, row)| {
                if row.len() != self.feature_names.len() {
                    return Err(PipelineError::Schema(format!(
                        "row {row_idx} has {} features, model expects {}",
                        row.len(),
                        self.feature_names.len()
                    )));
                }
                let sum: f64 = self.trees.iter().map(|tree| tree.evaluate(row)).sum();
                Ok(sum / self.trees.len() as f64)
            })
            .collect()
    }

    /// Predicted label per row: positive when the mean probability exceeds 0.5
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<bool>> {
        Ok(self
            .predict_proba(rows)?
            .into_iter()
            .map(|p| p > 0.5)
            .collect())
    }

    /// Predict samples after checking they use the model's feature columns
    pub fn predict_samples(&self, samples: &Samples) -> Result<Vec<bool>> {
        if samples.feature_names() != self.feature_names.as_slice() {
            return Err(PipelineError::Schema(format!(
                "model was trained on [{}] but samples have [{}]",
                self.feature_names.join(", "),
                samples.feature_names().join(", ")
            )));
        }
        self.predict(samples.features())
    }

    /// Importances in the model's feature order
    pub fn importances(&self) -> Vec<FeatureImportance> {
        self.feature_names
            .iter()
            .zip(self.importances.iter())
            .map(|(feature, &score)| FeatureImportance {
                feature: feature.clone(),
                score,
            })
            .collect()
    }

    /// Importances for the named features, in the caller's order
    ///
    /// The names must be exactly the model's features, in any order.
    pub fn importances_for<S: AsRef<str>>(
        &self,
        feature_names: &[S],
    ) -> Result<Vec<FeatureImportance>> {
        if feature_names.len() != self.feature_names.len() {
            return Err(PipelineError::Schema(format!(
                "expected {} feature names, got {}",
                self.feature_names.len(),
                feature_names.len()
            )));
        }

        let by_name: HashMap<&str, f64> = self
            .feature_names
            .iter()
            .map(String::as_str)
            .zip(self.importances.iter().copied())
            .collect();

        let mut seen = std::collections::HashSet::new();
        feature_names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                if !seen.insert(name) {
                    return Err(PipelineError::Schema(format!(
                        "feature '{name}' requested more than once"
                    )));
                }
                by_name
                    .get(name)
                    .map(|&score| FeatureImportance {
                        feature: name.to_string(),
                        score,
                    })
                    .ok_or_else(|| {
                        PipelineError::Schema(format!("model has no feature '{name}'"))
                    })
            })
            .collect()
    }

    /// Importances sorted by score; ties broken by feature name
    pub fn ranked_importances(&self, order: ImportanceOrder) -> Vec<FeatureImportance> {
        let mut ranked = self.importances();
        ranked.sort_by(|a, b| {
            let by_score = a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal);
            let by_score = match order {
                ImportanceOrder::Ascending => by_score,
                ImportanceOrder::Descending => by_score.reverse(),
            };
            by_score.then_with(|| a.feature.cmp(&b.feature))
        });
        ranked
    }
}

/// Random forest trainer
pub struct ForestTrainer {
    config: ForestConfig,
}

impl ForestTrainer {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    /// Fit a forest on the training partition
    pub fn fit(&self, train: &Samples) -> Result<RandomForest> {
        self.config.validate()?;

        let n_samples = train.len();
        let positives = train.positive_count();
        if n_samples == 0 {
            return Err(PipelineError::InsufficientData(
                "training partition is empty".to_string(),
            ));
        }
        if positives == 0 || positives == n_samples {
            return Err(PipelineError::InsufficientData(format!(
                "training labels contain a single class ({positives} of {n_samples} positive)"
            )));
        }

        let feature_count = train.feature_count();
        let tree_config = TreeConfig {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: self.config.max_features.resolve(feature_count),
        };
        let full_class_weights = balanced_weights(train.labels(), None);

        info!(
            trees = self.config.n_estimators,
            max_depth = self.config.max_depth,
            class_weight = %self.config.class_weight,
            rows = n_samples,
            positives,
            "fitting random forest"
        );

        let mut trees = Vec::with_capacity(self.config.n_estimators);
        for tree_idx in 0..self.config.n_estimators {
            let mut rng = seeded_rng(derive_seed(self.config.seed, "tree", tree_idx as u64));

            let counts = if self.config.bootstrap {
                bootstrap_counts(n_samples, &mut rng)
            } else {
                vec![1u32; n_samples]
            };

            let class_weights = match self.config.class_weight {
                ClassWeight::None => [1.0, 1.0],
                ClassWeight::Balanced => full_class_weights,
                ClassWeight::BalancedSubsample => balanced_weights(train.labels(), Some(&counts)),
            };

            let weights: Vec<f64> = counts
                .iter()
                .zip(train.labels())
                .map(|(&count, &label)| count as f64 * class_weights[usize::from(label)])
                .collect();

            let builder = CartBuilder::new(
                train.features(),
                train.labels(),
                &weights,
                feature_count,
                tree_config.clone(),
            );
            let tree = builder.build(&mut rng);
            debug!(
                tree = tree_idx + 1,
                nodes = tree.node_count(),
                depth = tree.depth(),
                "built tree"
            );
            trees.push(tree);
        }

        let importances = aggregate_importances(&trees, feature_count);
        let total_nodes = trees.iter().map(Tree::node_count).sum();
        let mean_tree_depth =
            trees.iter().map(|t| t.depth() as f64).sum::<f64>() / trees.len() as f64;
        let model_hash = hex::encode(blake3::hash(&serde_json::to_vec(&trees)?).as_bytes());

        info!(total_nodes, mean_tree_depth, %model_hash, "random forest fitted");

        Ok(RandomForest {
            feature_names: train.feature_names().to_vec(),
            trees,
            importances,
            metadata: ModelMetadata {
                n_estimators: self.config.n_estimators,
                max_depth: self.config.max_depth,
                class_weight: self.config.class_weight,
                seed: self.config.seed,
                training_rows: n_samples,
                training_positives: positives,
                mean_tree_depth,
                total_nodes,
                model_hash,
            },
        })
    }
}

/// Fit a forest with the given hyperparameters
pub fn fit(train: &Samples, config: &ForestConfig) -> Result<RandomForest> {
    ForestTrainer::new(config.clone()).fit(train)
}

/// Multiplicity of each row in a bootstrap resample of size `n`
fn bootstrap_counts(n: usize, rng: &mut impl Rng) -> Vec<u32> {
    let mut counts = vec![0u32; n];
    for _ in 0..n {
        counts[rng.gen_range(0..n)] += 1;
    }
    counts
}

/// `n / (n_classes * count_c)` over the (optionally resampled) labels
///
/// Classes absent from the sample get weight 0; they have no rows anyway.
fn balanced_weights(labels: &[bool], counts: Option<&[u32]>) -> [f64; 2] {
    let mut per_class = [0.0f64; 2];
    for (idx, &label) in labels.iter().enumerate() {
        let multiplicity = counts.map_or(1.0, |c| c[idx] as f64);
        per_class[usize::from(label)] += multiplicity;
    }

    let total: f64 = per_class.iter().sum();
    let present = per_class.iter().filter(|&&c| c > 0.0).count() as f64;
    per_class.map(|count| {
        if count > 0.0 {
            total / (present * count)
        } else {
            0.0
        }
    })
}

/// Mean of per-tree normalized importances, renormalized to sum 1
fn aggregate_importances(trees: &[Tree], feature_count: usize) -> Vec<f64> {
    let per_tree: Vec<Vec<f64>> = trees
        .iter()
        .filter_map(Tree::normalized_importances)
        .collect();

    if per_tree.is_empty() {
        return vec![0.0; feature_count];
    }

    let mut mean = vec![0.0; feature_count];
    for importances in &per_tree {
        for (acc, value) in mean.iter_mut().zip(importances) {
            *acc += value;
        }
    }
    for value in &mut mean {
        *value /= per_tree.len() as f64;
    }

    let total: f64 = mean.iter().sum();
    if total > 0.0 {
        for value in &mut mean {
            *value /= total;
        }
    }
    mean
}
