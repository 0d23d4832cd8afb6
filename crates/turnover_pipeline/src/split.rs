//! Stratified train/test partitioning
//!
//! Each label class is shuffled independently with a seeded generator and
//! cut so that its share of the training partition matches its share of
//! the whole dataset. Per-class quotas are assigned with the largest
//! remainder method so the partition sizes are exact.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::{Dataset, Samples};
use crate::deterministic::{derive_seed, seeded_rng};
use crate::errors::{PipelineError, Result};

/// Split settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows assigned to training, in (0, 1)
    pub train_ratio: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            seed: 42,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "train ratio must be in (0, 1), got {}",
                self.train_ratio
            )));
        }
        Ok(())
    }
}

/// Train and test partitions with the row indices they came from
#[derive(Clone, Debug)]
pub struct TrainTestSplit {
    pub train: Samples,
    pub test: Samples,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Split a dataset projection into stratified train/test partitions
pub fn split<S: AsRef<str>>(
    dataset: &Dataset,
    features: &[S],
    label: &str,
    train_ratio: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    let samples = dataset.samples(features, label)?;
    stratified_split(&samples, &SplitConfig { train_ratio, seed })
}

/// Stratified split of already projected samples
pub fn stratified_split(samples: &Samples, config: &SplitConfig) -> Result<TrainTestSplit> {
    config.validate()?;

    let n = samples.len();
    let n_train = train_size(n, config.train_ratio);
    let n_test = n - n_train;
    if n_train == 0 || n_test == 0 {
        return Err(PipelineError::InsufficientData(format!(
            "{n} rows cannot fill both partitions at train ratio {}",
            config.train_ratio
        )));
    }

    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (idx, &label) in samples.labels().iter().enumerate() {
        by_class[usize::from(label)].push(idx);
    }

    let counts = [by_class[0].len(), by_class[1].len()];
    if let Some(missing) = counts.iter().position(|&c| c == 0) {
        return Err(PipelineError::InsufficientData(format!(
            "labels contain no {} rows; both classes are needed to stratify",
            class_name(missing)
        )));
    }
    let quotas = allocate_quotas(&counts, n_train);

    let mut train_indices = Vec::with_capacity(n_train);
    let mut test_indices = Vec::with_capacity(n_test);

    for (class, members) in by_class.iter_mut().enumerate() {
        let quota = quotas[class];
        if quota == 0 || quota == members.len() {
            return Err(PipelineError::InsufficientData(format!(
                "class {} has {} member(s), too few to stratify at train ratio {}",
                class_name(class),
                members.len(),
                config.train_ratio
            )));
        }

        let mut rng = seeded_rng(derive_seed(config.seed, "stratified-split", class as u64));
        members.shuffle(&mut rng);
        train_indices.extend_from_slice(&members[..quota]);
        test_indices.extend_from_slice(&members[quota..]);
    }

    train_indices.sort_unstable();
    test_indices.sort_unstable();

    debug!(
        train = train_indices.len(),
        test = test_indices.len(),
        negatives = counts[0],
        positives = counts[1],
        "stratified split"
    );

    Ok(TrainTestSplit {
        train: samples.select(&train_indices),
        test: samples.select(&test_indices),
        train_indices,
        test_indices,
    })
}

fn class_name(class: usize) -> &'static str {
    if class == 1 {
        "'left'"
    } else {
        "'stayed'"
    }
}

/// Rows assigned to training; tolerant of ratios like 0.7 that are not exact in binary
fn train_size(n: usize, ratio: f64) -> usize {
    let exact = ratio * n as f64;
    ((exact + 1e-9).floor() as usize).min(n)
}

/// Largest-remainder apportionment of `total` across classes by size
fn allocate_quotas(counts: &[usize; 2], total: usize) -> [usize; 2] {
    let n: usize = counts.iter().sum();
    if n == 0 {
        return [0, 0];
    }

    let mut quotas = [0usize; 2];
    let mut remainders = [(0u128, 0usize); 2];
    for (class, &count) in counts.iter().enumerate() {
        let scaled = count as u128 * total as u128;
        quotas[class] = (scaled / n as u128) as usize;
        remainders[class] = (scaled % n as u128, class);
    }

    let mut leftover = total - quotas.iter().sum::<usize>();
    // Larger remainder first; ties go to the larger class, then the lower index
    remainders.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then(counts[b.1].cmp(&counts[a.1]))
            .then(a.1.cmp(&b.1))
    });
    for &(_, class) in remainders.iter() {
        if leftover == 0 {
            break;
        }
        if quotas[class] < counts[class] {
            quotas[class] += 1;
            leftover -= 1;
        }
    }

    quotas
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn samples_with(positives: usize, total: usize) -> Samples {
        let features = (0..total).map(|i| vec![i as f64]).collect();
        let labels = (0..total).map(|i| i < positives).collect();
        Samples::new(vec!["x".into()], features, labels).unwrap()
    }

    #[test]
    fn test_partition_sizes_and_disjointness() {
        let samples = samples_with(250, 1000);
        let split = stratified_split(&samples, &SplitConfig::default()).unwrap();

        assert_eq!(split.train.len(), 800);
        assert_eq!(split.test.len(), 200);
        assert_eq!(split.train.positive_count(), 200);
        assert_eq!(split.test.positive_count(), 50);

        let train: HashSet<_> = split.train_indices.iter().collect();
        let test: HashSet<_> = split.test_indices.iter().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 1000);
    }

    #[test]
    fn test_split_is_seed_deterministic() {
        let samples = samples_with(30, 100);
        let config = SplitConfig { train_ratio: 0.7, seed: 7 };
        let a = stratified_split(&samples, &config).unwrap();
        let b = stratified_split(&samples, &config).unwrap();
        let c = stratified_split(&samples, &SplitConfig { train_ratio: 0.7, seed: 8 }).unwrap();

        assert_eq!(a.train_indices, b.train_indices);
        assert_ne!(a.train_indices, c.train_indices);
        assert_eq!(a.train.len(), 70);
        assert_eq!(a.train.positive_count(), 21);
    }

    #[test]
    fn test_rows_stay_aligned_with_labels() {
        let samples = samples_with(10, 40);
        let split = stratified_split(&samples, &SplitConfig::default()).unwrap();

        for (row, &label) in split.test.features().iter().zip(split.test.labels()) {
            assert_eq!(label, (row[0] as usize) < 10);
        }
    }

    #[test]
    fn test_singleton_class_rejected() {
        let samples = samples_with(1, 50);
        let result = stratified_split(&samples, &SplitConfig::default());
        assert!(matches!(result, Err(PipelineError::InsufficientData(_))));
    }

    #[test]
    fn test_tiny_dataset_rejected() {
        let samples = samples_with(1, 2);
        let result = stratified_split(&samples, &SplitConfig { train_ratio: 0.9, seed: 1 });
        assert!(matches!(result, Err(PipelineError::InsufficientData(_))));
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let samples = samples_with(10, 40);
        for ratio in [0.0, 1.0, -0.5, f64::NAN] {
            let result = stratified_split(&samples, &SplitConfig { train_ratio: ratio, seed: 1 });
            assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_single_class_dataset_rejected() {
        for positives in [0, 10] {
            let samples = samples_with(positives, 10);
            let result = stratified_split(&samples, &SplitConfig::default());
            assert!(
                matches!(result, Err(PipelineError::InsufficientData(_))),
                "accepted {positives} positives of 10"
            );
        }
    }

    #[test]
    fn test_quota_rounding_is_exact() {
        assert_eq!(allocate_quotas(&[7, 3], 7), [5, 2]);
        assert_eq!(allocate_quotas(&[750, 250], 800), [600, 200]);
        let q = allocate_quotas(&[5, 5], 5);
        assert_eq!(q.iter().sum::<usize>(), 5);
    }
}
