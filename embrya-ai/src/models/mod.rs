//! Frozen classifiers and the model registry
//!
//! Classifiers are opaque, pre-trained predictors over the 20-entry feature
//! row. They are loaded once at startup into an immutable `ModelRegistry`
//! and shared read-only across requests.

pub mod logistic;
pub mod registry;
pub mod tree;

pub use logistic::LogisticRegression;
pub use registry::{ModelRegistry, ModelSpec, ModelStore, ModelStoreError, RegisteredModel};
pub use tree::{DecisionTree, RandomForest, TreeNode};

use thiserror::Error;

/// Classifier invocation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictorError {
    /// Input row length differs from what the model was trained on
    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Model parameters are internally inconsistent
    #[error("Malformed model: {0}")]
    MalformedModel(String),

    /// Model produced NaN/infinite output
    #[error("Non-finite model output")]
    NonFiniteOutput,
}

/// Binary classifier over a feature row
///
/// Implementations must be pure functions of their input: the same row always
/// yields the same class and probabilities.
pub trait Predictor: Send + Sync {
    /// Predicted class index (1 = good)
    fn predict(&self, features: &[f64]) -> Result<u8, PredictorError>;

    /// Class probabilities, `[p0, p1]` for binary models
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, PredictorError>;
}

/// Reject rows of the wrong length
pub(crate) fn check_dimension(expected: usize, features: &[f64]) -> Result<(), PredictorError> {
    if features.len() != expected {
        return Err(PredictorError::DimensionMismatch {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}
