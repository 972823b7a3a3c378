//! Logistic regression classifier

use serde::{Deserialize, Serialize};

use super::{check_dimension, Predictor, PredictorError};

/// Per-feature standardisation applied before the linear model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Binary logistic regression: p(good) = σ(w·x + b)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub intercept: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<StandardScaler>,
}

impl LogisticRegression {
    pub fn new(weights: Vec<f64>, intercept: f64) -> Self {
        Self {
            weights,
            intercept,
            scaler: None,
        }
    }

    /// Validate parameter shapes against the expected input width
    pub fn validate(&self, n_features: usize) -> Result<(), PredictorError> {
        if self.weights.len() != n_features {
            return Err(PredictorError::MalformedModel(format!(
                "expected {} weights, found {}",
                n_features,
                self.weights.len()
            )));
        }
        if let Some(scaler) = &self.scaler {
            if scaler.mean.len() != n_features || scaler.scale.len() != n_features {
                return Err(PredictorError::MalformedModel(
                    "scaler length does not match weights".to_string(),
                ));
            }
            if scaler.scale.iter().any(|s| *s == 0.0) {
                return Err(PredictorError::MalformedModel(
                    "scaler has zero scale".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn probability_good(&self, features: &[f64]) -> Result<f64, PredictorError> {
        check_dimension(self.weights.len(), features)?;

        let logit = features
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let x = match &self.scaler {
                    Some(s) => (x - s.mean[i]) / s.scale[i],
                    None => x,
                };
                self.weights[i] * x
            })
            .sum::<f64>()
            + self.intercept;

        let p = 1.0 / (1.0 + (-logit).exp());
        if p.is_finite() {
            Ok(p)
        } else {
            Err(PredictorError::NonFiniteOutput)
        }
    }
}

impl Predictor for LogisticRegression {
    fn predict(&self, features: &[f64]) -> Result<u8, PredictorError> {
        Ok(u8::from(self.probability_good(features)? > 0.5))
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, PredictorError> {
        let p = self.probability_good(features)?;
        Ok(vec![1.0 - p, p])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_weights_give_half() {
        let model = LogisticRegression::new(vec![0.0; 3], 0.0);
        let proba = model.predict_proba(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(proba, vec![0.5, 0.5]);
        assert_eq!(model.predict(&[1.0, 2.0, 3.0]).unwrap(), 0);
    }

    #[test]
    fn test_positive_logit_predicts_good() {
        let model = LogisticRegression::new(vec![1.0, 0.0], 0.5);
        let proba = model.predict_proba(&[2.0, 100.0]).unwrap();
        assert!(proba[1] > 0.9);
        assert!((proba[0] + proba[1] - 1.0).abs() < 1e-12);
        assert_eq!(model.predict(&[2.0, 100.0]).unwrap(), 1);
    }

    #[test]
    fn test_scaler_is_applied() {
        let mut model = LogisticRegression::new(vec![1.0], 0.0);
        model.scaler = Some(StandardScaler {
            mean: vec![10.0],
            scale: vec![2.0],
        });
        // (10 - 10) / 2 = 0 → σ(0)
        let proba = model.predict_proba(&[10.0]).unwrap();
        assert!((proba[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch() {
        let model = LogisticRegression::new(vec![1.0, 1.0], 0.0);
        assert_eq!(
            model.predict(&[1.0]),
            Err(PredictorError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_validate_rejects_bad_scaler() {
        let mut model = LogisticRegression::new(vec![1.0, 1.0], 0.0);
        model.scaler = Some(StandardScaler {
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 0.0],
        });
        assert!(model.validate(2).is_err());
        assert!(LogisticRegression::new(vec![1.0], 0.0).validate(2).is_err());
    }
}
