//! GBDT regressor model
//!
//! Implements an additive tree ensemble with:
//! - Canonical JSON serialization
//! - Blake3 model hashing
//! - Structural validation before first use

use super::tree::Tree;
use super::{FeatureAccess, SplitRule};
use crate::serde_canon::{hash_canonical_hex, to_canonical_json, CanonicalError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// GBDT Model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("Canonical serialization error: {0}")]
    CanonicalError(#[from] CanonicalError),

    #[error("Model expects {required} features but the projection has {available}")]
    FeatureWidth { required: usize, available: usize },
}

/// Current model format version
pub const MODEL_VERSION: i32 = 1;

/// Additive tree ensemble regressor
///
/// score = base_score + sum(tree.weight * leaf)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    /// Model format version
    pub version: i32,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,

    /// Constant added to every prediction
    #[serde(default)]
    pub base_score: f64,

    /// Comparison used at numeric splits
    #[serde(default)]
    pub split_rule: SplitRule,
}

impl Model {
    /// Create a new GBDT model
    pub fn new(trees: Vec<Tree>, base_score: f64) -> Self {
        Self {
            version: MODEL_VERSION,
            trees,
            base_score,
            split_rule: SplitRule::default(),
        }
    }

    pub fn with_split_rule(mut self, split_rule: SplitRule) -> Self {
        self.split_rule = split_rule;
        self
    }

    /// Validate model structure
    pub fn validate(&self, allow_categorical: bool) -> Result<(), ModelError> {
        if self.version != MODEL_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if !self.base_score.is_finite() {
            return Err(ModelError::ValidationFailed(format!(
                "Invalid base_score: {}",
                self.base_score
            )));
        }

        if self.trees.is_empty() {
            return Err(ModelError::ValidationFailed("Model has no trees".to_string()));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(allow_categorical).map_err(|e| {
                ModelError::ValidationFailed(format!("Tree {} validation failed: {}", i, e))
            })?;
        }

        Ok(())
    }

    /// Number of input features the trees reference
    pub fn required_width(&self) -> usize {
        self.trees
            .iter()
            .filter_map(Tree::max_feature_index)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Check that a projection of `width` columns covers every split
    pub fn check_width(&self, width: usize) -> Result<(), ModelError> {
        let required = self.required_width();
        if required > width {
            return Err(ModelError::FeatureWidth {
                required,
                available: width,
            });
        }
        Ok(())
    }

    /// Predict for one projected feature vector
    pub fn score<F: FeatureAccess + ?Sized>(&self, features: &F) -> f64 {
        self.trees.iter().fold(self.base_score, |sum, tree| {
            sum + tree.weight * tree.evaluate(features, self.split_rule)
        })
    }

    /// Serialize model to canonical JSON (sorted keys, no whitespace)
    pub fn to_canonical_json(&self) -> Result<String, ModelError> {
        Ok(to_canonical_json(self)?)
    }

    /// Compute model hash as hex string
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        Ok(hash_canonical_hex(self)?)
    }

    /// Get number of trees in the model
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::tree::Node;

    fn create_test_model() -> Model {
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
            0.5,
        );

        Model::new(vec![tree1, tree2], 10.0)
    }

    #[test]
    fn test_model_inference() {
        let model = create_test_model();
        assert_eq!(model.score(&[30.0, 20.0][..]), 10.0 + 100.0 - 25.0);
        assert_eq!(model.score(&[60.0, 40.0][..]), 10.0 + 200.0 + 25.0);
        assert_eq!(model.num_trees(), 2);
    }

    #[test]
    fn test_required_width() {
        let model = create_test_model();
        assert_eq!(model.required_width(), 2);
        assert!(model.check_width(2).is_ok());
        assert!(matches!(
            model.check_width(1),
            Err(ModelError::FeatureWidth { required: 2, available: 1 })
        ));
    }

    #[test]
    fn test_canonical_json() {
        let model = create_test_model();
        let json = model.to_canonical_json().unwrap();
        assert!(json.contains("\"base_score\""));
        assert!(json.contains("\"split_rule\":\"less_or_equal\""));
        assert!(!json.contains('\n'));

        let restored: Model = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, model);
        assert_eq!(restored.hash_hex().unwrap(), model.hash_hex().unwrap());
    }

    #[test]
    fn test_hash_changes_with_model() {
        let model1 = create_test_model();
        let mut model2 = create_test_model();
        model2.trees[0].nodes[1] = Node::leaf(1, 999.0);
        assert_ne!(model1.hash_hex().unwrap(), model2.hash_hex().unwrap());
        assert_eq!(model1.hash_hex().unwrap().len(), 64);
    }

    #[test]
    fn test_model_validation() {
        assert!(create_test_model().validate(false).is_ok());

        let mut invalid = create_test_model();
        invalid.version = 999;
        assert!(invalid.validate(false).is_err());

        let mut invalid = create_test_model();
        invalid.base_score = f64::INFINITY;
        assert!(invalid.validate(false).is_err());

        assert!(Model::new(vec![], 0.0).validate(false).is_err());
    }
}
