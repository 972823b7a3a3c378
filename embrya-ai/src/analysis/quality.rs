//! Cross-model quality metrics

use serde::{Deserialize, Serialize};

use super::{first_match, AnalysisError, Rule};
use crate::types::{ModelPrediction, PredictionLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionConsistency {
    High,
    Moderate,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UncertaintyLevel {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Fraction of models agreeing with the majority label
    pub agreement_rate: f64,
    pub prediction_consistency: PredictionConsistency,
    /// Per-model max(p, 1 - p), in model order
    pub model_confidence_scores: Vec<f64>,
    pub uncertainty_level: UncertaintyLevel,
}

impl QualityMetrics {
    pub fn unavailable() -> Self {
        Self {
            agreement_rate: 0.0,
            prediction_consistency: PredictionConsistency::Low,
            model_confidence_scores: Vec::new(),
            uncertainty_level: UncertaintyLevel::High,
        }
    }
}

/// Majority label over per-model classes; an even split resolves to `Good`
pub fn majority_label(predictions: &[ModelPrediction]) -> PredictionLabel {
    let good = predictions
        .iter()
        .filter(|p| p.label() == PredictionLabel::Good)
        .count();
    if good * 2 >= predictions.len() {
        PredictionLabel::Good
    } else {
        PredictionLabel::NotGood
    }
}

fn population_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

struct Spread {
    peak: f64,
    std: f64,
}

pub fn assess_quality(predictions: &[ModelPrediction]) -> Result<QualityMetrics, AnalysisError> {
    if predictions.is_empty() {
        return Err(AnalysisError::NoPredictions);
    }
    if predictions.iter().any(|p| !p.probability_good.is_finite()) {
        return Err(AnalysisError::NonFinite("probability_good"));
    }

    let majority = majority_label(predictions);
    let agreeing = predictions.iter().filter(|p| p.label() == majority).count();
    let agreement_rate = agreeing as f64 / predictions.len() as f64;

    let probabilities: Vec<f64> = predictions.iter().map(|p| p.probability_good).collect();
    let confidences: Vec<f64> = predictions.iter().map(ModelPrediction::confidence).collect();
    let spread = Spread {
        peak: confidences.iter().copied().fold(0.0, f64::max),
        std: population_std(&probabilities),
    };

    let consistency_rules: [Rule<f64, PredictionConsistency>; 2] = [
        Rule {
            when: |s| *s < 0.05,
            then: PredictionConsistency::High,
        },
        Rule {
            when: |s| *s < 0.15,
            then: PredictionConsistency::Moderate,
        },
    ];
    let uncertainty_rules: [Rule<Spread, UncertaintyLevel>; 2] = [
        Rule {
            when: |s| s.peak >= 0.8 && s.std < 0.1,
            then: UncertaintyLevel::Low,
        },
        Rule {
            when: |s| s.peak >= 0.6 && s.std < 0.2,
            then: UncertaintyLevel::Moderate,
        },
    ];

    Ok(QualityMetrics {
        agreement_rate,
        prediction_consistency: first_match(
            &consistency_rules,
            &spread.std,
            PredictionConsistency::Low,
        ),
        model_confidence_scores: confidences,
        uncertainty_level: first_match(&uncertainty_rules, &spread, UncertaintyLevel::High),
    })
}
