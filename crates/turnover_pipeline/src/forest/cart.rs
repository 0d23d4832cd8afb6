//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy binary classification trees on weighted Gini impurity.
//! Row weights carry both bootstrap multiplicity and class balancing;
//! rows with zero weight never reach the builder.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use super::tree::{Node, Tree};

/// Splits must reduce weighted impurity by more than this share of the node weight
const MIN_RELATIVE_GAIN: f64 = 1e-12;

/// Growth limits for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Non-constant features inspected per split
    pub max_features: usize,
}

/// Weighted class totals of a node
#[derive(Clone, Copy, Debug, Default)]
struct ClassWeights {
    negative: f64,
    positive: f64,
}

impl ClassWeights {
    fn add(&mut self, positive: bool, weight: f64) {
        if positive {
            self.positive += weight;
        } else {
            self.negative += weight;
        }
    }

    fn total(&self) -> f64 {
        self.negative + self.positive
    }

    fn gini(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        let p = self.positive / total;
        let q = self.negative / total;
        1.0 - p * p - q * q
    }

    fn positive_fraction(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            0.0
        } else {
            self.positive / total
        }
    }

    fn minus(&self, other: &ClassWeights) -> ClassWeights {
        ClassWeights {
            negative: self.negative - other.negative,
            positive: self.positive - other.positive,
        }
    }
}

/// Best split found for a node
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Weighted impurity decrease: W·G - W_l·G_l - W_r·G_r
    gain: f64,
}

/// Build a classification tree using the exact-greedy CART algorithm
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<f64>],
    labels: &'a [bool],
    weights: &'a [f64],
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a [Vec<f64>],
        labels: &'a [bool],
        weights: &'a [f64],
        feature_count: usize,
        config: TreeConfig,
    ) -> Self {
        debug_assert_eq!(features.len(), labels.len());
        debug_assert_eq!(features.len(), weights.len());

        Self {
            config,
            features,
            labels,
            weights,
            feature_count,
        }
    }

    /// Build tree over the rows with positive weight
    pub fn build(&self, rng: &mut ChaCha8Rng) -> Tree {
        let indices: Vec<usize> = (0..self.labels.len())
            .filter(|&i| self.weights[i] > 0.0)
            .collect();

        let mut nodes = Vec::new();
        let mut impurity_decrease = vec![0.0; self.feature_count];
        self.build_node(&indices, 0, &mut nodes, &mut impurity_decrease, rng);

        Tree {
            nodes,
            impurity_decrease,
        }
    }

    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        impurity_decrease: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let current_idx = nodes.len();
        let weights = self.class_weights(indices);

        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || indices.len() < 2 * self.config.min_samples_leaf
            || weights.gini() <= 0.0
        {
            nodes.push(Node::leaf(weights.positive_fraction()));
            return current_idx;
        }

        let Some(split) = self
            .find_best_split(indices, &weights, rng)
            .filter(|split| split.gain > MIN_RELATIVE_GAIN * weights.total())
        else {
            nodes.push(Node::leaf(weights.positive_fraction()));
            return current_idx;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&idx| self.features[idx][split.feature_idx] <= split.threshold);

        impurity_decrease[split.feature_idx] += split.gain;

        // Reserve space for current node
        nodes.push(Node::internal(split.feature_idx, split.threshold));

        let left = self.build_node(&left_indices, depth + 1, nodes, impurity_decrease, rng);
        let right = self.build_node(&right_indices, depth + 1, nodes, impurity_decrease, rng);

        nodes[current_idx].left = left;
        nodes[current_idx].right = right;

        current_idx
    }

    /// Scan features in random order until `max_features` non-constant ones are seen
    fn find_best_split(
        &self,
        indices: &[usize],
        parent: &ClassWeights,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let mut order: Vec<usize> = (0..self.feature_count).collect();
        order.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(indices.len());

        for feature_idx in order {
            if visited >= self.config.max_features {
                break;
            }

            sorted.clear();
            sorted.extend(
                indices
                    .iter()
                    .map(|&idx| (self.features[idx][feature_idx], idx)),
            );
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            if sorted.first().map(|s| s.0) == sorted.last().map(|s| s.0) {
                continue;
            }
            visited += 1;

            if let Some(candidate) = self.best_threshold(&sorted, feature_idx, parent) {
                if best.as_ref().map_or(true, |current| candidate.gain > current.gain) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    /// Sweep sorted values, scoring every cut between distinct neighbours
    fn best_threshold(
        &self,
        sorted: &[(f64, usize)],
        feature_idx: usize,
        parent: &ClassWeights,
    ) -> Option<SplitCandidate> {
        let n = sorted.len();
        let min_leaf = self.config.min_samples_leaf;
        let parent_impurity = parent.total() * parent.gini();

        let mut left = ClassWeights::default();
        let mut best: Option<SplitCandidate> = None;

        for pos in 0..n - 1 {
            let (value, idx) = sorted[pos];
            left.add(self.labels[idx], self.weights[idx]);

            let next_value = sorted[pos + 1].0;
            if value == next_value {
                continue;
            }

            let left_count = pos + 1;
            if left_count < min_leaf || n - left_count < min_leaf {
                continue;
            }

            let right = parent.minus(&left);
            let gain = parent_impurity - left.total() * left.gini() - right.total() * right.gini();

            if best.as_ref().map_or(true, |current| gain > current.gain) {
                let mut threshold = value + (next_value - value) / 2.0;
                if threshold >= next_value {
                    threshold = value;
                }
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold,
                    gain,
                });
            }
        }

        best
    }

    fn class_weights(&self, indices: &[usize]) -> ClassWeights {
        let mut weights = ClassWeights::default();
        for &idx in indices {
            weights.add(self.labels[idx], self.weights[idx]);
        }
        weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deterministic::seeded_rng;

    fn config(max_depth: usize) -> TreeConfig {
        TreeConfig {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 2,
        }
    }

    #[test]
    fn test_separable_stump() {
        let features = vec![vec![1.0, 5.0], vec![2.0, 5.0], vec![8.0, 5.0], vec![9.0, 5.0]];
        let labels = vec![false, false, true, true];
        let weights = vec![1.0; 4];

        let builder = CartBuilder::new(&features, &labels, &weights, 2, config(3));
        let tree = builder.build(&mut seeded_rng(1));

        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.nodes[0].feature_idx, 0);
        assert_eq!(tree.nodes[0].threshold, 5.0);
        assert_eq!(tree.evaluate(&[1.5, 5.0]), 0.0);
        assert_eq!(tree.evaluate(&[8.5, 5.0]), 1.0);
        assert!(tree.impurity_decrease[0] > 0.0);
        assert_eq!(tree.impurity_decrease[1], 0.0);
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let features = vec![vec![1.0], vec![2.0]];
        let labels = vec![true, true];
        let weights = vec![1.0, 1.0];

        let tree = CartBuilder::new(&features, &labels, &weights, 1, config(6))
            .build(&mut seeded_rng(1));
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].leaf, Some(1.0));
    }

    #[test]
    fn test_max_depth_respected() {
        let features: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let labels: Vec<bool> = (0..64).map(|i| i % 2 == 0).collect();
        let weights = vec![1.0; 64];

        let tree = CartBuilder::new(&features, &labels, &weights, 1, config(3))
            .build(&mut seeded_rng(1));
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_zero_weight_rows_ignored() {
        let features = vec![vec![1.0], vec![2.0], vec![3.0]];
        let labels = vec![false, true, true];
        let weights = vec![0.0, 2.0, 1.0];

        let tree = CartBuilder::new(&features, &labels, &weights, 1, config(6))
            .build(&mut seeded_rng(1));
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].leaf, Some(1.0));
    }

    #[test]
    fn test_zero_gain_split_becomes_leaf() {
        // Both cuts on x leave the class ratio unchanged
        let features = vec![vec![1.0], vec![1.0], vec![2.0], vec![2.0], vec![2.0], vec![2.0]];
        let labels = vec![false, true, false, false, true, true];
        let weights = vec![1.0; 6];

        let tree = CartBuilder::new(&features, &labels, &weights, 1, config(6))
            .build(&mut seeded_rng(1));
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].leaf, Some(0.5));
        assert_eq!(tree.impurity_decrease, vec![0.0]);
    }

    #[test]
    fn test_class_weights_shift_leaf_value() {
        let features = vec![vec![1.0], vec![1.0], vec![1.0]];
        let labels = vec![false, false, true];
        let weights = vec![0.75, 0.75, 1.5];

        let tree = CartBuilder::new(&features, &labels, &weights, 1, config(6))
            .build(&mut seeded_rng(1));
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].leaf, Some(0.5));
    }
}
