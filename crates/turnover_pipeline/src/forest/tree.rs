//! Decision tree structures for forest inference
//!
//! Trees are stored as a flat node arena; node 0 is the root and children
//! are referenced by index.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes `leaf` is `None` and rows with
/// `features[feature_idx] <= threshold` go left.
///
/// For leaf nodes `leaf` holds the weighted fraction of positive
/// training rows that reached it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub feature_idx: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    pub leaf: Option<f64>,
}

impl Node {
    pub fn internal(feature_idx: usize, threshold: f64) -> Self {
        Self {
            feature_idx,
            threshold,
            left: 0,
            right: 0,
            leaf: None,
        }
    }

    pub fn leaf(positive_fraction: f64) -> Self {
        Self {
            feature_idx: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            leaf: Some(positive_fraction),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf.is_some()
    }
}

/// A single fitted classification tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,

    /// Weighted Gini decrease accumulated per feature
    pub impurity_decrease: Vec<f64>,
}

impl Tree {
    /// Positive-class probability for one feature row
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;

        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };

            if let Some(value) = node.leaf {
                return value;
            }

            idx = if features[node.feature_idx] <= node.threshold {
                node.left
            } else {
                node.right
            };
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf (a lone root leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => {
                    1 + walk(nodes, node.left).max(walk(nodes, node.right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    /// Per-feature importance normalized to sum 1; `None` for a lone leaf
    pub fn normalized_importances(&self) -> Option<Vec<f64>> {
        if self.nodes.len() <= 1 {
            return None;
        }

        let decrease: Vec<f64> = self.impurity_decrease.iter().map(|v| v.max(0.0)).collect();
        let total: f64 = decrease.iter().sum();
        if total > 0.0 {
            Some(decrease.iter().map(|v| v / total).collect())
        } else {
            Some(vec![0.0; decrease.len()])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        let mut root = Node::internal(0, 50.0);
        root.left = 1;
        root.right = 2;
        Tree {
            nodes: vec![root, Node::leaf(0.1), Node::leaf(0.9)],
            impurity_decrease: vec![3.0, 0.0],
        }
    }

    #[test]
    fn test_tree_evaluation() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[30.0, 0.0]), 0.1);
        assert_eq!(tree.evaluate(&[50.0, 0.0]), 0.1); // Equal goes left
        assert_eq!(tree.evaluate(&[60.0, 0.0]), 0.9);
    }

    #[test]
    fn test_depth_and_node_count() {
        let tree = stump();
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.node_count(), 3);

        let leaf_only = Tree {
            nodes: vec![Node::leaf(0.5)],
            impurity_decrease: vec![0.0, 0.0],
        };
        assert_eq!(leaf_only.depth(), 0);
        assert!(leaf_only.normalized_importances().is_none());
    }

    #[test]
    fn test_normalized_importances() {
        let importances = stump().normalized_importances().unwrap();
        assert_eq!(importances, vec![1.0, 0.0]);
    }

    #[test]
    fn test_rounding_noise_never_goes_negative() {
        let mut tree = stump();
        tree.impurity_decrease = vec![0.5, -8.881784197001252e-16];

        let importances = tree.normalized_importances().unwrap();
        assert_eq!(importances, vec![1.0, 0.0]);
    }
}
