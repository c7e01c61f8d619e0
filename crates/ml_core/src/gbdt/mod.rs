//! Gradient boosted tree inference
//!
//! The three ensemble regressors are stored in one JSON tree format:
//!
//! ```json
//! {
//!   "version": 1,
//!   "base_score": 850.0,
//!   "split_rule": "less_or_equal",
//!   "trees": [
//!     {
//!       "nodes": [
//!         {"id":0,"left":1,"right":2,"feature_idx":3,"threshold":12.5,"leaf":null},
//!         {"id":1,"left":-1,"right":-1,"feature_idx":-1,"leaf":-23.4},
//!         {"id":2,"left":-1,"right":-1,"feature_idx":-1,"leaf":45.6}
//!       ],
//!       "weight": 1.0
//!     }
//!   ]
//! }
//! ```
//!
//! Numeric models read a `[f64]` projection. The categorical-native model
//! reads `[FeatureValue]`, where split nodes may carry a `categories` set.
//!
//! # Usage
//!
//! ```rust
//! use agrirent_ml_core::gbdt::{Model, Node, Tree};
//!
//! let tree = Tree::new(
//!     vec![
//!         Node::internal(0, 0, 50.0, 1, 2),
//!         Node::leaf(1, 100.0),
//!         Node::leaf(2, 200.0),
//!     ],
//!     1.0,
//! );
//! let model = Model::new(vec![tree], 0.0);
//! assert_eq!(model.score(&[30.0][..]), 100.0);
//! ```

pub mod model;
pub mod tree;

pub use model::{Model, ModelError, MODEL_VERSION};
pub use tree::{Node, Tree};

use serde::{Deserialize, Serialize};

/// Comparison applied at numeric splits; `LessOrEqual` sends ties left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitRule {
    #[default]
    LessOrEqual,
    Less,
}

impl SplitRule {
    pub fn goes_left(self, value: f64, threshold: f64) -> bool {
        match self {
            SplitRule::LessOrEqual => value <= threshold,
            SplitRule::Less => value < threshold,
        }
    }
}

/// One cell of a mixed numeric/categorical projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
}

impl FeatureValue {
    pub fn is_finite(&self) -> bool {
        match self {
            FeatureValue::Number(v) => v.is_finite(),
            FeatureValue::Category(_) => true,
        }
    }
}

/// Read access to a projected feature vector
pub trait FeatureAccess {
    fn width(&self) -> usize;

    /// Numeric value at `idx`, or `None` if absent or not numeric
    fn numeric(&self, idx: usize) -> Option<f64>;

    /// Category at `idx`, or `None` if absent or not categorical
    fn category(&self, idx: usize) -> Option<&str>;
}

impl FeatureAccess for [f64] {
    fn width(&self) -> usize {
        self.len()
    }

    fn numeric(&self, idx: usize) -> Option<f64> {
        self.get(idx).copied()
    }

    fn category(&self, _idx: usize) -> Option<&str> {
        None
    }
}

impl FeatureAccess for [FeatureValue] {
    fn width(&self) -> usize {
        self.len()
    }

    fn numeric(&self, idx: usize) -> Option<f64> {
        match self.get(idx) {
            Some(FeatureValue::Number(v)) => Some(*v),
            _ => None,
        }
    }

    fn category(&self, idx: usize) -> Option<&str> {
        match self.get(idx) {
            Some(FeatureValue::Category(c)) => Some(c.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_two_tree_model_inference() {
        let tree1 = Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 1, 2),
                Node::leaf(1, 100.0),
                Node::leaf(2, 200.0),
            ],
            1.0,
        );
        let tree2 = Tree::new(
            vec![
                Node::internal(0, 1, 30.0, 1, 2),
                Node::leaf(1, -50.0),
                Node::leaf(2, 50.0),
            ],
            1.0,
        );
        let model = Model::new(vec![tree1, tree2], 0.0);

        assert_eq!(model.score(&[30.0, 20.0][..]), 50.0);
        assert_eq!(model.score(&[60.0, 40.0][..]), 250.0);
    }

    #[test]
    fn test_mixed_projection_model() {
        let tree = Tree::new(
            vec![
                Node::internal(0, 0, 40.0, 1, 2),
                Node::categorical(1, 1, vec!["Tractor".into()], 3, 4),
                Node::leaf(2, 300.0),
                Node::leaf(3, 120.0),
                Node::leaf(4, 80.0),
            ],
            1.0,
        );
        let model = Model::new(vec![tree], 500.0).with_split_rule(SplitRule::Less);
        assert!(model.validate(true).is_ok());

        let row = vec![
            FeatureValue::Number(35.0),
            FeatureValue::Category("Tractor".into()),
        ];
        assert_eq!(model.score(row.as_slice()), 620.0);
        assert_eq!(row.as_slice().width(), 2);
    }

    #[test]
    fn test_feature_value_untagged_json() {
        let values: Vec<FeatureValue> = serde_json::from_str(r#"[1.5,"Tractor"]"#).unwrap();
        assert_eq!(values[0], FeatureValue::Number(1.5));
        assert_eq!(values[1], FeatureValue::Category("Tractor".into()));
        assert!(values.iter().all(FeatureValue::is_finite));
    }

    #[test]
    fn test_deterministic_inference_repeated() {
        let tree = Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 1, 2),
                Node::leaf(1, 100.0),
                Node::leaf(2, 200.0),
            ],
            1.0,
        );
        let model = Model::new(vec![tree], 0.0);
        let features = [30.0, 40.0, 50.0];
        let first = model.score(&features[..]);
        assert!((0..100).all(|_| model.score(&features[..]) == first));
    }
}
