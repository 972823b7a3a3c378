//! Ensemble Predictor
//!
//! **[ENSEMBLE]** Runs the feature row through every registered classifier,
//! averages p(good), and derives label, confidence and tier.
//!
//! Classifier failures are isolated: a model that errors is skipped with a
//! warning. When no model produces a result the fixed fallback is returned
//! so the clinical workflow is never blocked by a model outage.

use tracing::{debug, error, warn};

use crate::models::{ModelRegistry, PredictorError, RegisteredModel};
use crate::types::{
    ConfidenceLevel, EnsembleResult, FeatureVector, ModelPrediction, PredictionLabel,
};

/// Model id reported on the fallback prediction
pub const FALLBACK_MODEL_ID: &str = "fallback";

/// p(good) of the fallback prediction
pub const FALLBACK_PROBABILITY_GOOD: f64 = 0.65;

/// Confidence tier breakpoints, highest first; `confidence >= threshold` matches
const CONFIDENCE_TIERS: [(f64, ConfidenceLevel); 2] =
    [(0.8, ConfidenceLevel::High), (0.6, ConfidenceLevel::Medium)];

/// Ensemble output plus whether it came from the fallback path
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleOutcome {
    pub result: EnsembleResult,
    pub fallback: bool,
}

/// Map a confidence value onto its tier
pub fn confidence_level(confidence: f64) -> ConfidenceLevel {
    CONFIDENCE_TIERS
        .iter()
        .find(|(threshold, _)| confidence >= *threshold)
        .map(|(_, level)| *level)
        .unwrap_or(ConfidenceLevel::Low)
}

/// The fixed result used when no classifier could be invoked
pub fn fallback_result() -> EnsembleResult {
    let p = FALLBACK_PROBABILITY_GOOD;
    EnsembleResult {
        prediction: PredictionLabel::Good,
        probability_good: p,
        probability_not_good: 1.0 - p,
        confidence: p,
        confidence_level: ConfidenceLevel::Medium,
        viability_score: p * 100.0,
        model_predictions: vec![ModelPrediction::new(FALLBACK_MODEL_ID, 1, p)],
    }
}

/// Invoke one classifier and normalise its output
fn run_model(model: &RegisteredModel, row: &[f64]) -> Result<ModelPrediction, PredictorError> {
    let class = model.predictor.predict(row)?;
    let proba = model.predictor.predict_proba(row)?;

    let p_good = match proba.as_slice() {
        [_, p1] => *p1,
        [p] => *p,
        [] => {
            return Err(PredictorError::MalformedModel(
                "empty probability vector".to_string(),
            ))
        }
        other => {
            return Err(PredictorError::MalformedModel(format!(
                "expected binary output, got {} classes",
                other.len()
            )))
        }
    };

    if !p_good.is_finite() || !(0.0..=1.0).contains(&p_good) {
        return Err(PredictorError::NonFiniteOutput);
    }

    Ok(ModelPrediction::new(model.id.clone(), class, p_good))
}

/// Average predictions across every registered classifier
pub fn predict(registry: &ModelRegistry, features: &FeatureVector) -> EnsembleOutcome {
    let row = features.as_slice();

    let predictions: Vec<ModelPrediction> = registry
        .models()
        .iter()
        .filter_map(|model| match run_model(model, row) {
            Ok(prediction) => {
                debug!(
                    model = %prediction.model,
                    probability_good = prediction.probability_good,
                    "Model prediction"
                );
                Some(prediction)
            }
            Err(e) => {
                warn!(model = %model.id, error = %e, "Model failed, excluded from ensemble");
                None
            }
        })
        .collect();

    if predictions.is_empty() {
        error!(
            loaded = registry.len(),
            "No model produced a prediction; returning fallback result"
        );
        return EnsembleOutcome {
            result: fallback_result(),
            fallback: true,
        };
    }

    let p_good =
        predictions.iter().map(|p| p.probability_good).sum::<f64>() / predictions.len() as f64;
    let confidence = p_good.max(1.0 - p_good);

    EnsembleOutcome {
        result: EnsembleResult {
            prediction: PredictionLabel::from_probability(p_good),
            probability_good: p_good,
            probability_not_good: 1.0 - p_good,
            confidence,
            confidence_level: confidence_level(confidence),
            viability_score: p_good * 100.0,
            model_predictions: predictions,
        },
        fallback: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Predictor;
    use crate::types::FEATURE_COUNT;
    use std::sync::Arc;

    struct Fixed(Vec<f64>);

    impl Predictor for Fixed {
        fn predict(&self, _: &[f64]) -> Result<u8, PredictorError> {
            Ok(u8::from(self.0.last().copied().unwrap_or(0.0) > 0.5))
        }
        fn predict_proba(&self, _: &[f64]) -> Result<Vec<f64>, PredictorError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl Predictor for Broken {
        fn predict(&self, _: &[f64]) -> Result<u8, PredictorError> {
            Err(PredictorError::DimensionMismatch {
                expected: FEATURE_COUNT + 1,
                actual: FEATURE_COUNT,
            })
        }
        fn predict_proba(&self, _: &[f64]) -> Result<Vec<f64>, PredictorError> {
            Err(PredictorError::NonFiniteOutput)
        }
    }

    fn registry(models: Vec<(&str, Arc<dyn Predictor>)>) -> ModelRegistry {
        ModelRegistry::from_predictors(
            "test",
            models.into_iter().map(|(id, p)| (id.to_string(), p)).collect(),
        )
    }

    fn features() -> FeatureVector {
        crate::imaging::default_features().vector
    }

    #[test]
    fn test_confidence_breakpoints_inclusive() {
        assert_eq!(confidence_level(0.8), ConfidenceLevel::High);
        assert_eq!(confidence_level(0.7999), ConfidenceLevel::Medium);
        assert_eq!(confidence_level(0.6), ConfidenceLevel::Medium);
        assert_eq!(confidence_level(0.5999), ConfidenceLevel::Low);
        assert_eq!(confidence_level(0.5), ConfidenceLevel::Low);
    }

    #[test]
    fn test_average_of_two_models() {
        let reg = registry(vec![
            ("a", Arc::new(Fixed(vec![0.1, 0.9]))),
            ("b", Arc::new(Fixed(vec![0.3, 0.7]))),
        ]);
        let outcome = predict(&reg, &features());
        assert!(!outcome.fallback);
        let r = outcome.result;
        assert!((r.probability_good - 0.8).abs() < 1e-12);
        assert!((r.probability_good + r.probability_not_good - 1.0).abs() < 1e-12);
        assert_eq!(r.prediction, PredictionLabel::Good);
        assert_eq!(r.confidence_level, ConfidenceLevel::High);
        assert!((r.viability_score - 80.0).abs() < 1e-9);
        assert_eq!(r.model_predictions.len(), 2);
    }

    #[test]
    fn test_single_output_model_uses_sole_probability() {
        let reg = registry(vec![("solo", Arc::new(Fixed(vec![0.3])))]);
        let r = predict(&reg, &features()).result;
        assert!((r.probability_good - 0.3).abs() < 1e-12);
        assert_eq!(r.prediction, PredictionLabel::NotGood);
        assert!((r.confidence - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_exact_half_is_not_good() {
        let reg = registry(vec![("even", Arc::new(Fixed(vec![0.5, 0.5])))]);
        let r = predict(&reg, &features()).result;
        assert_eq!(r.prediction, PredictionLabel::NotGood);
        assert_eq!(r.confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_failing_model_is_skipped() {
        let reg = registry(vec![
            ("broken", Arc::new(Broken)),
            ("ok", Arc::new(Fixed(vec![0.2, 0.8]))),
        ]);
        let outcome = predict(&reg, &features());
        assert!(!outcome.fallback);
        assert_eq!(outcome.result.model_predictions.len(), 1);
        assert_eq!(outcome.result.model_predictions[0].model, "ok");
    }

    #[test]
    fn test_all_failing_uses_fallback() {
        let reg = registry(vec![
            ("broken", Arc::new(Broken)),
            ("empty", Arc::new(Fixed(vec![]))),
        ]);
        let outcome = predict(&reg, &features());
        assert!(outcome.fallback);
        assert_eq!(outcome.result, fallback_result());
    }

    #[test]
    fn test_fallback_values() {
        let r = predict(&ModelRegistry::empty("v0"), &features()).result;
        assert_eq!(r.prediction, PredictionLabel::Good);
        assert!((r.viability_score - 65.0).abs() < 1e-9);
        assert!((r.confidence - 0.65).abs() < 1e-12);
        assert_eq!(r.confidence_level, ConfidenceLevel::Medium);
        assert_eq!(r.model_predictions[0].model, FALLBACK_MODEL_ID);
    }
}
