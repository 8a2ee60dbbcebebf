//! Multi-target GBDT regressor
//!
//! One additive tree ensemble per target. A target's prediction is its
//! `base_score` plus the sum of its trees' leaf values.

use super::tree::Tree;
use crate::features::AlignedMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// GBDT model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("Model expects {expected} features, input has {found}")]
    FeatureCount { expected: usize, found: usize },
}

/// Current model format version
pub const MODEL_FORMAT_VERSION: i32 = 1;

/// Trees and base score for a single output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetEnsemble {
    /// Target name as recorded at training time
    #[serde(default)]
    pub name: String,

    /// Constant added to every prediction
    #[serde(default)]
    pub base_score: f64,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,
}

impl TargetEnsemble {
    pub fn new(name: impl Into<String>, base_score: f64, trees: Vec<Tree>) -> Self {
        Self {
            name: name.into(),
            base_score,
            trees,
        }
    }

    pub fn score(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |sum, tree| sum + tree.evaluate(features))
    }
}

/// Gradient-boosted regressor with one ensemble per target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiTargetGbdt {
    /// Model format version (always 1 for now)
    pub version: i32,

    /// Estimator name, e.g. "XGBoost"
    #[serde(default)]
    pub name: String,

    /// Width of the feature rows the model was trained on
    pub n_features: usize,

    /// Per-target ensembles, in output order
    pub targets: Vec<TargetEnsemble>,
}

impl MultiTargetGbdt {
    pub fn new(name: impl Into<String>, n_features: usize, targets: Vec<TargetEnsemble>) -> Self {
        Self {
            version: MODEL_FORMAT_VERSION,
            name: name.into(),
            n_features,
            targets,
        }
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != MODEL_FORMAT_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if self.n_features == 0 {
            return Err(ModelError::ValidationFailed(
                "Model declares zero features".to_string(),
            ));
        }

        if self.targets.is_empty() {
            return Err(ModelError::ValidationFailed(
                "Model has no targets".to_string(),
            ));
        }

        for (t, target) in self.targets.iter().enumerate() {
            if !target.base_score.is_finite() {
                return Err(ModelError::ValidationFailed(format!(
                    "Target {t} has non-finite base score"
                )));
            }
            for (i, tree) in target.trees.iter().enumerate() {
                tree.validate().map_err(|e| {
                    ModelError::ValidationFailed(format!("Target {t} tree {i}: {e}"))
                })?;
                if let Some(max) = tree.max_feature_index() {
                    if max >= self.n_features {
                        return Err(ModelError::ValidationFailed(format!(
                            "Target {t} tree {i} splits on feature {max}, model has {}",
                            self.n_features
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Batch inference: one output row of `n_outputs()` values per matrix row
    pub fn predict(&self, matrix: &AlignedMatrix) -> Result<Vec<Vec<f64>>, ModelError> {
        if matrix.n_cols() != self.n_features {
            return Err(ModelError::FeatureCount {
                expected: self.n_features,
                found: matrix.n_cols(),
            });
        }

        Ok(matrix
            .rows()
            .map(|row| self.targets.iter().map(|target| target.score(row)).collect())
            .collect())
    }

    pub fn n_outputs(&self) -> usize {
        self.targets.len()
    }

    pub fn num_trees(&self) -> usize {
        self.targets.iter().map(|target| target.trees.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::tree::Node;

    fn create_test_model() -> MultiTargetGbdt {
        let energy = TargetEnsemble::new(
            "energy",
            10.0,
            vec![
                Tree::new(vec![
                    Node::internal(0, 0, 0.0, 1, 2),
                    Node::leaf(1, -2.0),
                    Node::leaf(2, 3.0),
                ]),
                Tree::new(vec![
                    Node::internal(0, 1, 0.5, 1, 2),
                    Node::leaf(1, 1.0),
                    Node::leaf(2, -1.0),
                ]),
            ],
        );
        let emissions = TargetEnsemble::new("emissions", 1000.0, vec![Tree::new(vec![Node::leaf(0, 250.0)])]);

        MultiTargetGbdt::new("XGBoost", 2, vec![energy, emissions])
    }

    #[test]
    fn test_model_creation() {
        let model = create_test_model();
        assert_eq!(model.version, MODEL_FORMAT_VERSION);
        assert_eq!(model.n_outputs(), 2);
        assert_eq!(model.num_trees(), 3);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_batch_inference() {
        let model = create_test_model();
        let matrix = AlignedMatrix::new(vec!["a".into(), "b".into()], vec![-1.0, 0.0, 1.0, 1.0]).unwrap();

        let out = model.predict(&matrix).unwrap();
        assert_eq!(out, vec![vec![9.0, 1250.0], vec![12.0, 1250.0]]);
    }

    #[test]
    fn test_feature_count_checked() {
        let model = create_test_model();
        let matrix = AlignedMatrix::new(vec!["a".into()], vec![1.0]).unwrap();
        assert!(matches!(
            model.predict(&matrix),
            Err(ModelError::FeatureCount { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_model_validation() {
        let mut invalid = create_test_model();
        invalid.version = 999;
        assert!(invalid.validate().is_err());

        let mut invalid = create_test_model();
        invalid.n_features = 1;
        assert!(invalid.validate().is_err());

        let mut invalid = create_test_model();
        invalid.targets.clear();
        assert!(invalid.validate().is_err());
    }
}
