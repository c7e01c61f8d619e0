//! Decision tree structures for GBDT inference
//!
//! Nodes split either on a numeric threshold or on a category set. Missing
//! values (NaN, absent index, wrong kind) follow the node's default branch.

use super::{FeatureAccess, SplitRule};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into the projected feature vector
/// - `left` and `right` point to child node indices
/// - `categories`, when present, turns the node into a categorical split:
///   values in the set go left
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` contains the prediction value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    #[serde(rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,

    /// Numeric split threshold
    #[serde(default)]
    pub threshold: f64,

    /// Category set for categorical splits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,

    /// Branch taken when the feature is missing
    #[serde(default = "default_true")]
    pub default_left: bool,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<f64>,
}

impl Node {
    /// Create a new numeric split node
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            categories: None,
            default_left: true,
            leaf: None,
        }
    }

    /// Create a categorical split node; listed categories go left
    pub fn categorical(
        id: i32,
        feature_idx: i32,
        categories: Vec<String>,
        left: i32,
        right: i32,
    ) -> Self {
        Self {
            categories: Some(categories),
            default_left: false,
            ..Self::internal(id, feature_idx, 0.0, left, right)
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            categories: None,
            default_left: true,
            leaf: Some(value),
        }
    }

    pub fn with_default_left(mut self, default_left: bool) -> Self {
        self.default_left = default_left;
        self
    }

    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }

    pub fn is_categorical(&self) -> bool {
        !self.is_leaf() && self.categories.is_some()
    }

    fn goes_left<F: FeatureAccess + ?Sized>(&self, features: &F, rule: SplitRule) -> bool {
        let idx = self.feature_idx as usize;
        match &self.categories {
            Some(set) => match features.category(idx) {
                Some(value) => set.iter().any(|c| c == value),
                None => self.default_left,
            },
            None => match features.numeric(idx) {
                Some(value) if !value.is_nan() => rule.goes_left(value, self.threshold),
                _ => self.default_left,
            },
        }
    }
}

/// A single regression tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,

    /// Multiplier applied to this tree's leaf value
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Tree {
    /// Create a new tree with the given nodes and weight
    pub fn new(nodes: Vec<Node>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    /// Evaluate this tree on a feature vector.
    ///
    /// A malformed structure (bad child index, cycle) scores 0.0; `validate`
    /// rejects such trees at load time.
    pub fn evaluate<F: FeatureAccess + ?Sized>(&self, features: &F, rule: SplitRule) -> f64 {
        let mut idx = 0usize;

        // A valid path visits each node at most once.
        for _ in 0..=self.nodes.len() {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };

            if node.is_leaf() {
                return node.leaf.unwrap_or(0.0);
            }

            let next = if node.goes_left(features, rule) {
                node.left
            } else {
                node.right
            };
            if next < 0 {
                return 0.0;
            }
            idx = next as usize;
        }
        0.0
    }

    /// Largest feature index referenced by any split
    pub fn max_feature_index(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|n| !n.is_leaf() && n.feature_idx >= 0)
            .map(|n| n.feature_idx as usize)
            .max()
    }

    /// Validate tree structure
    pub fn validate(&self, allow_categorical: bool) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        if !self.weight.is_finite() {
            return Err(format!("Tree weight is not finite: {}", self.weight));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.is_leaf() {
                if node.left <= i as i32 || node.left as usize >= self.nodes.len() {
                    return Err(format!("Node {} has invalid left child: {}", i, node.left));
                }

                if node.right <= i as i32 || node.right as usize >= self.nodes.len() {
                    return Err(format!(
                        "Node {} has invalid right child: {}",
                        i, node.right
                    ));
                }

                if node.feature_idx < 0 {
                    return Err(format!(
                        "Internal node {} has invalid feature index: {}",
                        i, node.feature_idx
                    ));
                }

                if node.categories.is_some() && !allow_categorical {
                    return Err(format!("Node {i} splits on a category in a numeric model"));
                }

                if node.categories.is_none() && !node.threshold.is_finite() {
                    return Err(format!("Node {i} has non-finite threshold"));
                }
            } else {
                match node.leaf {
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                    Some(v) if !v.is_finite() => {
                        return Err(format!("Leaf node {i} has non-finite value"))
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(())
    }
}
