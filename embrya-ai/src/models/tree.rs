//! Decision tree and random forest classifiers
//!
//! Trees are stored as a flat node array. Node 0 is the root; a split sends
//! rows with `x[feature] <= threshold` to `left`, everything else to `right`.

use serde::{Deserialize, Serialize};

use super::{check_dimension, Predictor, PredictorError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class counts or weights at the leaf, normalised on use
    Leaf { values: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub n_features: usize,
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn new(n_features: usize, nodes: Vec<TreeNode>) -> Self {
        Self { n_features, nodes }
    }

    /// Structural checks: indices in range, non-empty leaves, no self-loops
    pub fn validate(&self, n_features: usize) -> Result<(), PredictorError> {
        if self.n_features != n_features {
            return Err(PredictorError::MalformedModel(format!(
                "tree expects {} features, registry uses {}",
                self.n_features, n_features
            )));
        }
        if self.nodes.is_empty() {
            return Err(PredictorError::MalformedModel("tree has no nodes".into()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= self.n_features {
                        return Err(PredictorError::MalformedModel(format!(
                            "node {} splits on feature {} out of range",
                            idx, feature
                        )));
                    }
                    for child in [left, right] {
                        if *child >= self.nodes.len() || *child <= idx {
                            return Err(PredictorError::MalformedModel(format!(
                                "node {} has invalid child {}",
                                idx, child
                            )));
                        }
                    }
                }
                TreeNode::Leaf { values } => {
                    let total: f64 = values.iter().sum();
                    if values.is_empty() || total <= 0.0 || !total.is_finite() {
                        return Err(PredictorError::MalformedModel(format!(
                            "leaf {} has no usable class values",
                            idx
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn leaf_for(&self, features: &[f64]) -> Result<&[f64], PredictorError> {
        check_dimension(self.n_features, features)?;

        let mut idx = 0;
        // Children always point forward, so a walk visits at most nodes.len() nodes
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { values }) => return Ok(values),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = features.get(*feature).copied().ok_or_else(|| {
                        PredictorError::MalformedModel(format!("feature {} out of range", feature))
                    })?;
                    idx = if x <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(PredictorError::MalformedModel(format!(
                        "node index {} out of range",
                        idx
                    )))
                }
            }
        }
        Err(PredictorError::MalformedModel("tree walk did not terminate".into()))
    }
}

fn normalise(values: &[f64]) -> Result<Vec<f64>, PredictorError> {
    let total: f64 = values.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(PredictorError::NonFiniteOutput);
    }
    Ok(values.iter().map(|v| v / total).collect())
}

fn argmax(proba: &[f64]) -> u8 {
    let mut best = 0;
    for (i, p) in proba.iter().enumerate() {
        if *p > proba[best] {
            best = i;
        }
    }
    best as u8
}

impl Predictor for DecisionTree {
    fn predict(&self, features: &[f64]) -> Result<u8, PredictorError> {
        Ok(argmax(&self.predict_proba(features)?))
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, PredictorError> {
        normalise(self.leaf_for(features)?)
    }
}

/// Bag of trees with averaged leaf probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn validate(&self, n_features: usize) -> Result<(), PredictorError> {
        if self.trees.is_empty() {
            return Err(PredictorError::MalformedModel("forest has no trees".into()));
        }
        self.trees.iter().try_for_each(|t| t.validate(n_features))
    }
}

impl Predictor for RandomForest {
    fn predict(&self, features: &[f64]) -> Result<u8, PredictorError> {
        Ok(argmax(&self.predict_proba(features)?))
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, PredictorError> {
        let mut sum: Vec<f64> = Vec::new();
        for tree in &self.trees {
            let proba = tree.predict_proba(features)?;
            if sum.is_empty() {
                sum = vec![0.0; proba.len()];
            }
            if proba.len() != sum.len() {
                return Err(PredictorError::MalformedModel(
                    "trees disagree on class count".into(),
                ));
            }
            for (acc, p) in sum.iter_mut().zip(&proba) {
                *acc += p;
            }
        }
        if sum.is_empty() {
            return Err(PredictorError::MalformedModel("forest has no trees".into()));
        }
        let n = self.trees.len() as f64;
        Ok(sum.into_iter().map(|p| p / n).collect())
    }
}
